//! Preset music catalog: named tracks bundled with the app plus any the
//! user adds, referenced from program steps by path.

use anyhow::{bail, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One entry of the preset music catalog. `name` and `path` are each
/// unique within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetTrack {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub category: String,
}

impl PresetTrack {
    pub fn new(id: &str, name: &str, path: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            category: category.to_string(),
        }
    }
}

/// The catalog shipped with the app, used when nothing is saved locally.
pub fn default_presets() -> Vec<PresetTrack> {
    vec![
        PresetTrack::new("p1", "Wedding March", "/audio/wedding-march.mp3", "ceremony"),
        PresetTrack::new("p2", "Canon in D", "/audio/canon-in-d.mp3", "ceremony"),
        PresetTrack::new("p3", "Bridal Chorus", "/audio/bridal-chorus.mp3", "entrance"),
        PresetTrack::new("p4", "A Thousand Years", "/audio/a-thousand-years.mp3", "entrance"),
        PresetTrack::new("p5", "Clair de Lune", "/audio/clair-de-lune.mp3", "dinner"),
        PresetTrack::new("p6", "La Vie en Rose", "/audio/la-vie-en-rose.mp3", "dinner"),
        PresetTrack::new("p7", "Champagne Toast", "/audio/champagne-toast.mp3", "toast"),
        PresetTrack::new("p8", "Celebration", "/audio/celebration.mp3", "party"),
    ]
}

/// Add a track to the catalog. Name and path are required and must not
/// collide with an existing entry. Returns the stored entry.
pub fn add_track(
    catalog: &mut Vec<PresetTrack>,
    name: &str,
    path: &str,
    category: &str,
) -> Result<PresetTrack> {
    if name.is_empty() || path.is_empty() {
        bail!("preset music needs both a name and a path");
    }
    if catalog.iter().any(|t| t.name == name) {
        bail!("a preset named \"{}\" already exists", name);
    }
    if catalog.iter().any(|t| t.path == path) {
        bail!("a preset with path \"{}\" already exists", path);
    }

    let track = PresetTrack::new(&fresh_id(catalog), name, path, category);
    catalog.push(track.clone());
    Ok(track)
}

/// Update an existing entry in place. Fields left as `None` keep their
/// current value; the uniqueness rules exclude the entry itself.
pub fn update_track(
    catalog: &mut [PresetTrack],
    id: &str,
    name: Option<&str>,
    path: Option<&str>,
    category: Option<&str>,
) -> Result<PresetTrack> {
    let index = match catalog.iter().position(|t| t.id == id) {
        Some(i) => i,
        None => bail!("no preset music with id \"{}\"", id),
    };

    let new_name = name.unwrap_or(&catalog[index].name).to_string();
    let new_path = path.unwrap_or(&catalog[index].path).to_string();
    if new_name.is_empty() || new_path.is_empty() {
        bail!("preset music needs both a name and a path");
    }
    if catalog.iter().any(|t| t.name == new_name && t.id != id) {
        bail!("a preset named \"{}\" already exists", new_name);
    }
    if catalog.iter().any(|t| t.path == new_path && t.id != id) {
        bail!("a preset with path \"{}\" already exists", new_path);
    }

    let entry = &mut catalog[index];
    entry.name = new_name;
    entry.path = new_path;
    if let Some(category) = category {
        entry.category = category.to_string();
    }
    Ok(entry.clone())
}

/// Remove an entry by id. Returns the removed entry so callers can scrub
/// program steps that pointed at its path.
pub fn remove_track(catalog: &mut Vec<PresetTrack>, id: &str) -> Option<PresetTrack> {
    let index = catalog.iter().position(|t| t.id == id)?;
    Some(catalog.remove(index))
}

/// Millisecond-timestamp id, bumped past any id already in the catalog.
fn fresh_id(catalog: &[PresetTrack]) -> String {
    let mut candidate = Utc::now().timestamp_millis() as u64;
    while catalog.iter().any(|t| t.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_consistent() {
        let catalog = default_presets();

        assert!(!catalog.is_empty());
        for track in &catalog {
            assert!(!track.name.is_empty());
            assert!(track.path.starts_with("/audio/"));
        }
        // the shipped list itself must satisfy the uniqueness rules
        for (i, a) in catalog.iter().enumerate() {
            for b in catalog.iter().skip(i + 1) {
                assert_ne!(a.name, b.name);
                assert_ne!(a.path, b.path);
            }
        }
    }

    #[test]
    fn test_add_track() {
        let mut catalog = Vec::new();
        let track = add_track(&mut catalog, "First Dance", "/audio/first-dance.mp3", "party")
            .unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(track.name, "First Dance");
        assert!(!track.id.is_empty());
    }

    #[test]
    fn test_add_rejects_duplicate_name() {
        let mut catalog = default_presets();
        let before = catalog.clone();

        let err = add_track(&mut catalog, "Wedding March", "/audio/other.mp3", "").unwrap_err();

        assert!(err.to_string().contains("Wedding March"));
        assert_eq!(catalog, before, "catalog must be unchanged after a rejection");
    }

    #[test]
    fn test_add_rejects_duplicate_path() {
        let mut catalog = default_presets();
        let before = catalog.clone();

        let err = add_track(&mut catalog, "Renamed", "/audio/canon-in-d.mp3", "").unwrap_err();

        assert!(err.to_string().contains("/audio/canon-in-d.mp3"));
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_add_rejects_empty_fields() {
        let mut catalog = Vec::new();
        assert!(add_track(&mut catalog, "", "/audio/x.mp3", "").is_err());
        assert!(add_track(&mut catalog, "X", "", "").is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_update_track() {
        let mut catalog = default_presets();

        let updated =
            update_track(&mut catalog, "p1", Some("Grand March"), None, Some("entrance")).unwrap();

        assert_eq!(updated.name, "Grand March");
        assert_eq!(updated.path, "/audio/wedding-march.mp3");
        assert_eq!(updated.category, "entrance");
    }

    #[test]
    fn test_update_rejects_collision_with_other_entry() {
        let mut catalog = default_presets();

        let err = update_track(&mut catalog, "p1", Some("Canon in D"), None, None).unwrap_err();

        assert!(err.to_string().contains("Canon in D"));
        assert_eq!(catalog[0].name, "Wedding March");
    }

    #[test]
    fn test_update_keeping_own_name_is_allowed() {
        let mut catalog = default_presets();

        let updated = update_track(
            &mut catalog,
            "p1",
            Some("Wedding March"),
            Some("/audio/wedding-march-full.mp3"),
            None,
        )
        .unwrap();

        assert_eq!(updated.path, "/audio/wedding-march-full.mp3");
    }

    #[test]
    fn test_update_unknown_id() {
        let mut catalog = default_presets();
        assert!(update_track(&mut catalog, "nope", Some("X"), None, None).is_err());
    }

    #[test]
    fn test_remove_track() {
        let mut catalog = default_presets();
        let len = catalog.len();

        let removed = remove_track(&mut catalog, "p3").unwrap();

        assert_eq!(removed.path, "/audio/bridal-chorus.mp3");
        assert_eq!(catalog.len(), len - 1);
        assert!(remove_track(&mut catalog, "p3").is_none());
    }

    #[test]
    fn test_fresh_ids_do_not_collide() {
        let mut catalog = Vec::new();
        for i in 0..5 {
            add_track(&mut catalog, &format!("T{}", i), &format!("/audio/t{}.mp3", i), "")
                .unwrap();
        }
        let mut ids: Vec<_> = catalog.iter().map(|t| t.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
