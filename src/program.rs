//! Ceremony program model.
//!
//! A program is an ordered list of steps; array position is execution
//! order. Steps are edited and synced wholesale (the entire list is
//! replaced), never patched individually.

use serde::{Deserialize, Serialize};

/// One step of the ceremony program.
///
/// `music` holds a preset catalog path when `is_preset` is true, or is
/// blank for uploaded tracks, which are referenced through
/// `music_source` (an uploaded-audio id) instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub music: String,
    #[serde(default)]
    pub music_source: String,
    #[serde(default)]
    pub music_name: String,
    #[serde(default)]
    pub is_preset: bool,
    /// Planned length in minutes, at least 1.
    pub duration: u32,
}

impl Step {
    pub fn new(id: &str, name: &str, script: &str, duration: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            script: script.to_string(),
            music: String::new(),
            music_source: String::new(),
            music_name: String::new(),
            is_preset: false,
            duration: duration.max(1),
        }
    }

    fn clear_music(&mut self) {
        self.music = String::new();
        self.music_source = String::new();
        self.music_name = String::new();
        self.is_preset = false;
    }
}

/// The built-in ceremony program used when no saved program exists.
pub fn default_program() -> Vec<Step> {
    vec![
        Step::new(
            "1",
            "Guest arrival",
            "Welcome, everyone. Please find your seats; the ceremony is about to begin.",
            15,
        ),
        Step::new(
            "2",
            "Groom's entrance",
            "Please welcome the groom with a warm round of applause!",
            5,
        ),
        Step::new(
            "3",
            "Bride's entrance",
            "And now the moment we have all been waiting for. Please rise and welcome the beautiful bride!",
            5,
        ),
        Step::new(
            "4",
            "Officiant's address",
            "We now move to the officiating of the marriage. Please welcome the officiant.",
            10,
        ),
        Step::new(
            "5",
            "Exchange of rings",
            "May the couple exchange rings, a token of their promise and their enduring love.",
            5,
        ),
        Step::new(
            "6",
            "Couple's speech",
            "The newlyweds will now share a few words of love and gratitude with their guests.",
            10,
        ),
        Step::new(
            "7",
            "Toast",
            "Please raise your glasses and join us in a toast to the happy couple. Cheers!",
            20,
        ),
        Step::new(
            "8",
            "Cutting of the cake",
            "A sweet moment: the couple will now cut the cake together, a symbol of the sweet life ahead.",
            5,
        ),
        Step::new(
            "9",
            "Bouquet toss",
            "All unmarried guests, please come forward for the bouquet toss. Who will be the lucky one?",
            5,
        ),
        Step::new(
            "10",
            "Closing",
            "Thank you all for sharing this joyful day. The ceremony has come to an end; please stay and enjoy the celebration!",
            10,
        ),
    ]
}

/// Clear music fields on steps that reference a deleted uploaded track.
/// Returns true if any step changed.
pub fn scrub_upload_reference(steps: &mut [Step], music_id: &str) -> bool {
    let mut changed = false;
    for step in steps.iter_mut() {
        if !step.is_preset && step.music_source == music_id {
            step.clear_music();
            changed = true;
        }
    }
    changed
}

/// Clear music fields on steps that reference preset paths no longer in
/// the catalog. Returns true if any step changed.
pub fn scrub_preset_paths(steps: &mut [Step], removed_paths: &[String]) -> bool {
    let mut changed = false;
    for step in steps.iter_mut() {
        if step.is_preset && removed_paths.iter().any(|p| p == &step.music) {
            step.clear_music();
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_program_shape() {
        let program = default_program();

        assert_eq!(program.len(), 10);
        assert_eq!(program[0].name, "Guest arrival");
        assert_eq!(program[0].duration, 15);
        assert_eq!(program[6].duration, 20);
        assert_eq!(program[9].id, "10");
        for step in &program {
            assert!(step.duration >= 1);
            assert!(step.music.is_empty());
            assert!(!step.is_preset);
        }
    }

    #[test]
    fn test_step_duration_clamped() {
        let step = Step::new("x", "Empty", "", 0);
        assert_eq!(step.duration, 1);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let step = Step::new("1", "Toast", "Raise your glasses.", 20);
        let json = serde_json::to_string(&step).unwrap();

        assert!(json.contains("\"musicSource\""));
        assert!(json.contains("\"musicName\""));
        assert!(json.contains("\"isPreset\""));
        assert!(!json.contains("\"music_source\""));
    }

    #[test]
    fn test_deserializes_sparse_step() {
        // Steps saved by older builds carry only the core fields.
        let json = r#"{"id":"3","name":"Vows","duration":5}"#;
        let step: Step = serde_json::from_str(json).unwrap();

        assert_eq!(step.name, "Vows");
        assert!(step.music.is_empty());
        assert!(!step.is_preset);
    }

    #[test]
    fn test_scrub_upload_reference() {
        let mut steps = default_program();
        steps[2].music_source = "upload-42".to_string();
        steps[2].music_name = "Processional".to_string();
        steps[4].music_source = "upload-42".to_string();
        steps[4].is_preset = true; // preset ref with a colliding id must survive

        let changed = scrub_upload_reference(&mut steps, "upload-42");

        assert!(changed);
        assert!(steps[2].music_source.is_empty());
        assert!(steps[2].music_name.is_empty());
        assert_eq!(steps[4].music_source, "upload-42");
    }

    #[test]
    fn test_scrub_upload_reference_no_match() {
        let mut steps = default_program();
        assert!(!scrub_upload_reference(&mut steps, "missing"));
    }

    #[test]
    fn test_scrub_preset_paths() {
        let mut steps = default_program();
        steps[0].music = "/audio/wedding-march.mp3".to_string();
        steps[0].is_preset = true;
        steps[1].music = "/audio/wedding-march.mp3".to_string();
        steps[1].is_preset = false; // uploaded track, path coincidence

        let removed = vec!["/audio/wedding-march.mp3".to_string()];
        let changed = scrub_preset_paths(&mut steps, &removed);

        assert!(changed);
        assert!(steps[0].music.is_empty());
        assert_eq!(steps[1].music, "/audio/wedding-march.mp3");
    }
}
