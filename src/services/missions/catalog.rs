use rand::{Rng, seq::SliceRandom};

use crate::state::game::{Difficulty, Mission, MissionCategory};

/// Built-in missions: (description, difficulty, category).
const DEFAULT_MISSIONS: [(&str, Difficulty, MissionCategory); 8] = [
    (
        "Get your target to repeat a tongue-twisting word three times in a row.",
        Difficulty::Medium,
        MissionCategory::Social,
    ),
    (
        "Take a selfie with your target while they are smiling.",
        Difficulty::Easy,
        MissionCategory::Creative,
    ),
    (
        "Get your target to sing the chorus of a well-known song.",
        Difficulty::Medium,
        MissionCategory::Performance,
    ),
    (
        "Slip an object into your target's pocket or bag without being noticed.",
        Difficulty::Hard,
        MissionCategory::Stealth,
    ),
    (
        "Get your target to imitate an animal during a conversation.",
        Difficulty::Medium,
        MissionCategory::Humor,
    ),
    (
        "Get your target to sit on the floor for no apparent reason.",
        Difficulty::Medium,
        MissionCategory::Physical,
    ),
    (
        "Get a handshake from your target lasting more than ten seconds.",
        Difficulty::Medium,
        MissionCategory::Social,
    ),
    (
        "Get your target to say: \"I am a little royal pony\".",
        Difficulty::Hard,
        MissionCategory::Humor,
    ),
];

/// Local missions used when the content provider is disabled or falls short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionCatalog {
    missions: Vec<Mission>,
}

impl MissionCatalog {
    /// Catalog holding `missions`.
    pub fn new(missions: Vec<Mission>) -> Self {
        Self { missions }
    }

    /// Every mission in the catalog.
    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    /// Number of missions.
    pub fn len(&self) -> usize {
        self.missions.len()
    }

    /// Whether the catalog has no mission.
    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    /// Top `missions` up to at least `needed` entries with shuffled catalog
    /// entries, cycling through the catalog as often as required.
    pub fn pad<R: Rng + ?Sized>(
        &self,
        mut missions: Vec<Mission>,
        needed: usize,
        rng: &mut R,
    ) -> Vec<Mission> {
        if missions.len() >= needed || self.missions.is_empty() {
            return missions;
        }

        let mut deck = self.missions.clone();
        deck.shuffle(rng);
        let missing = needed - missions.len();
        missions.extend(deck.iter().cycle().take(missing).cloned());
        missions
    }
}

impl Default for MissionCatalog {
    fn default() -> Self {
        let missions = DEFAULT_MISSIONS
            .iter()
            .enumerate()
            .map(|(index, (description, difficulty, category))| Mission {
                id: (index + 1).to_string(),
                description: (*description).to_string(),
                difficulty: *difficulty,
                category: *category,
            })
            .collect();
        Self { missions }
    }
}
