//! Scenario loading and validation.
//!
//! A scenario document holds the static [`Setting`] and one or more rounds,
//! each an ordered list of waves. Documents are RON or JSON; the JSON layout
//! matches the field names used by existing scenario files (`protect`,
//! `waveLength`, `iceTimes`, `shovelTime`, ...).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wavelab_core::error::ScheduleError;
use wavelab_core::scene::{Lane, SceneKind};
use wavelab_core::schedule::{
    compile, ScenarioMode, Schedule, Setting, Wave, REFRESH_CHECK_TICK,
};

/// Maximum number of waves in one round.
pub const MAX_WAVES: usize = 200;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to parse JSON.
    #[error("Failed to parse scenario JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    /// Scene code not recognised.
    #[error("Unknown scene code: {0}")]
    UnknownScene(String),
    /// A round failed to compile.
    #[error("Round {round}: {source}")]
    Schedule {
        /// Round index (1-based).
        round: usize,
        /// Underlying compile error.
        #[source]
        source: ScheduleError,
    },
    /// The document is well-formed but not runnable.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// A complete scenario document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Scene and protected positions.
    pub setting: Setting,
    /// Independent wave sequences, each compiled and aggregated separately.
    pub rounds: Vec<Vec<Wave>>,
}

impl Scenario {
    /// Load a scenario file; `.json` files are parsed as JSON, anything
    /// else as RON.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_ron_str(&contents)
        }
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Load from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        Ok(scenario)
    }

    /// Number of rounds.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Check the document can run in `mode` and compile every round.
    ///
    /// Explode-mode waves without an explicit observation start get the
    /// default one, so the returned schedules match the windows that will
    /// be sampled.
    pub fn validate(
        &self,
        mode: ScenarioMode,
        heavy_total: usize,
    ) -> Result<Vec<Schedule>, ScenarioError> {
        if self.rounds.is_empty() {
            return Err(ScenarioError::Invalid(
                "must provide at least one round".to_string(),
            ));
        }
        for (idx, round) in self.rounds.iter().enumerate() {
            if round.is_empty() {
                return Err(ScenarioError::Invalid(format!(
                    "round {} has no waves",
                    idx + 1
                )));
            }
            if round.len() > MAX_WAVES {
                return Err(ScenarioError::Invalid(format!(
                    "round {} has {} waves, at most {MAX_WAVES} allowed",
                    idx + 1,
                    round.len()
                )));
            }
        }

        self.validate_protected(mode)?;

        if mode == ScenarioMode::Explode {
            for (idx, round) in self.rounds.iter().enumerate() {
                for (wave_idx, wave) in round.iter().enumerate() {
                    if wave.observe_start() > wave.observe_end() {
                        return Err(ScenarioError::Invalid(format!(
                            "round {} wave {}: observation starts at {} after it ends at {}",
                            idx + 1,
                            wave_idx + 1,
                            wave.observe_start(),
                            wave.observe_end()
                        )));
                    }
                }
            }
        }

        if mode == ScenarioMode::Refresh {
            for (idx, round) in self.rounds.iter().enumerate() {
                for (wave_idx, wave) in round.iter().enumerate() {
                    if wave.length < REFRESH_CHECK_TICK {
                        return Err(ScenarioError::Invalid(format!(
                            "round {} wave {}: length {} ends before the refresh check at {REFRESH_CHECK_TICK}",
                            idx + 1,
                            wave_idx + 1,
                            wave.length
                        )));
                    }
                }
            }
        }

        self.rounds
            .iter()
            .enumerate()
            .map(|(idx, round)| {
                compile(&self.setting, round, mode, heavy_total).map_err(|source| {
                    ScenarioError::Schedule {
                        round: idx + 1,
                        source,
                    }
                })
            })
            .collect()
    }

    fn validate_protected(&self, mode: ScenarioMode) -> Result<(), ScenarioError> {
        let scene = self.setting.scene;
        if self.setting.protected.is_empty() {
            return Err(ScenarioError::Invalid(
                "must provide protected positions".to_string(),
            ));
        }

        let valid = valid_protected_lanes(scene);
        let mut seen: HashSet<Lane> = HashSet::new();
        for pos in &self.setting.protected {
            if !valid.contains(&pos.lane) {
                return Err(ScenarioError::Invalid(format!(
                    "invalid lane for protected position on {scene:?}: {}",
                    pos.lane
                )));
            }
            if !(1..=9).contains(&pos.column) {
                return Err(ScenarioError::Invalid(format!(
                    "invalid column for protected position: {}",
                    pos.column
                )));
            }
            if mode == ScenarioMode::Smash && !seen.insert(pos.lane) {
                return Err(ScenarioError::Invalid(format!(
                    "more than one protected position in lane {}",
                    pos.lane
                )));
            }
        }
        Ok(())
    }
}

/// Lanes a protected entity may stand in: the ground lanes of the scene.
#[must_use]
pub fn valid_protected_lanes(scene: SceneKind) -> Vec<Lane> {
    scene.ground_lanes()
}

/// Parse a scene name or short scene code.
pub fn parse_scene(code: &str) -> Result<SceneKind, ScenarioError> {
    match code.to_ascii_uppercase().as_str() {
        "DAY" => Ok(SceneKind::Day),
        "NIGHT" | "NE" | "DE" => Ok(SceneKind::Night),
        "POOL" => Ok(SceneKind::Pool),
        "FOG" | "FE" | "PE" => Ok(SceneKind::Fog),
        "ROOF" => Ok(SceneKind::Roof),
        "MOONNIGHT" | "MOON_NIGHT" | "ME" | "RE" => Ok(SceneKind::MoonNight),
        _ => Err(ScenarioError::UnknownScene(code.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavelab_core::schedule::{ProtectedKind, ProtectedPos};

    fn scenario(scene: SceneKind, lanes: &[Lane]) -> Scenario {
        Scenario {
            setting: Setting {
                scene,
                protected: lanes
                    .iter()
                    .map(|&lane| ProtectedPos {
                        kind: ProtectedKind::Launcher,
                        lane,
                        column: 8,
                    })
                    .collect(),
            },
            rounds: vec![vec![Wave::new(601)]],
        }
    }

    #[test]
    fn test_json_document() {
        let json = r#"{
            "setting": {
                "scene": "PE",
                "protect": [{"type": "Cob", "row": 1, "col": 8}]
            },
            "rounds": [[
                {
                    "iceTimes": [],
                    "waveLength": 601,
                    "actions": [
                        {"op": "Cob", "symbol": "PP", "time": 300,
                         "positions": [{"row": 2, "col": 9}, {"row": 5, "col": 9}]},
                        {"op": "FixedFodder", "symbol": "F", "time": 400, "shovelTime": 450,
                         "cards": ["Normal", "Puff"],
                         "positions": [{"row": 1, "col": 9}, {"row": 2, "col": 9}]},
                        {"op": "SmartFodder", "symbol": "C_POS", "time": 500,
                         "cards": [], "positions": [{"row": 1, "col": 9}, {"row": 6, "col": 9}],
                         "choose": 1, "waves": [1]}
                    ]
                }
            ]]
        }"#;

        let scenario = Scenario::from_json_str(json).unwrap();
        assert_eq!(scenario.setting.scene, SceneKind::Fog);
        assert_eq!(scenario.rounds[0][0].actions.len(), 3);
        assert!(scenario.validate(ScenarioMode::Smash, 10).is_ok());
    }

    #[test]
    fn test_ron_document() {
        let ron = r#"(
            setting: (scene: Day, protect: [(type: Normal, row: 3, col: 8)]),
            rounds: [[(iceTimes: [], waveLength: 601, actions: [])]],
        )"#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.setting.protected_lanes(), vec![3]);
        assert_eq!(scenario.round_count(), 1);
    }

    #[test]
    fn test_rejects_empty_rounds() {
        let mut empty = scenario(SceneKind::Day, &[2]);
        empty.rounds.clear();
        assert!(matches!(
            empty.validate(ScenarioMode::Smash, 1),
            Err(ScenarioError::Invalid(_))
        ));

        let mut no_waves = scenario(SceneKind::Day, &[2]);
        no_waves.rounds = vec![vec![]];
        assert!(no_waves.validate(ScenarioMode::Smash, 1).is_err());
    }

    #[test]
    fn test_rejects_too_many_waves() {
        let mut long = scenario(SceneKind::Day, &[2]);
        long.rounds = vec![vec![Wave::new(601); MAX_WAVES + 1]];
        assert!(long.validate(ScenarioMode::Smash, 1).is_err());

        long.rounds = vec![vec![Wave::new(601); MAX_WAVES]];
        assert!(long.validate(ScenarioMode::Smash, 1).is_ok());
    }

    #[test]
    fn test_backyard_lanes() {
        assert!(scenario(SceneKind::Fog, &[1, 2, 5, 6])
            .validate(ScenarioMode::Smash, 4)
            .is_ok());
        assert!(scenario(SceneKind::Fog, &[3])
            .validate(ScenarioMode::Smash, 4)
            .is_err());
        assert!(scenario(SceneKind::Day, &[6])
            .validate(ScenarioMode::Smash, 4)
            .is_err());
    }

    #[test]
    fn test_duplicate_lanes_only_rejected_in_smash() {
        let mut doubled = scenario(SceneKind::Day, &[2, 2]);
        doubled.setting.protected[1].column = 4;
        assert!(doubled.validate(ScenarioMode::Smash, 1).is_err());
        assert!(doubled.validate(ScenarioMode::Explode, 0).is_ok());
    }

    #[test]
    fn test_explode_window_must_not_be_empty() {
        let mut late = scenario(SceneKind::Day, &[2]);
        late.rounds[0][0].observe_from = Some(500);
        assert!(late.validate(ScenarioMode::Explode, 0).is_err());
        assert!(late.validate(ScenarioMode::Smash, 1).is_ok());
    }

    #[test]
    fn test_refresh_waves_must_reach_the_check() {
        let mut short = scenario(SceneKind::Day, &[2]);
        short.rounds[0][0].length = REFRESH_CHECK_TICK - 1;
        assert!(matches!(
            short.validate(ScenarioMode::Refresh, 0),
            Err(ScenarioError::Invalid(_))
        ));
        assert!(short.validate(ScenarioMode::Smash, 1).is_ok());

        short.rounds[0][0].length = REFRESH_CHECK_TICK;
        assert!(short.validate(ScenarioMode::Refresh, 0).is_ok());
    }

    #[test]
    fn test_compile_errors_name_the_round() {
        let mut roof = scenario(SceneKind::Roof, &[2]);
        let json = r#"{"op": "Cob", "symbol": "P", "time": 300, "positions": [{"row": 2, "col": 9}]}"#;
        roof.rounds.push(vec![Wave {
            actions: vec![serde_json::from_str(json).unwrap()],
            ..Wave::new(601)
        }]);

        match roof.validate(ScenarioMode::Smash, 1) {
            Err(ScenarioError::Schedule { round, source }) => {
                assert_eq!(round, 2);
                assert!(matches!(source, ScheduleError::MissingLauncherColumn { .. }));
            }
            other => panic!("expected a schedule error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_scene_codes() {
        assert_eq!(parse_scene("PE").unwrap(), SceneKind::Fog);
        assert_eq!(parse_scene("ne").unwrap(), SceneKind::Night);
        assert_eq!(parse_scene("MoonNight").unwrap(), SceneKind::MoonNight);
        assert!(matches!(parse_scene("XX"), Err(ScenarioError::UnknownScene(_))));
    }
}
