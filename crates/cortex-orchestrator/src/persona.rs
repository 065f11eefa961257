use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cortex_core::error::Result;

/// Persistent persona configuration: a display name, a system-prompt text
/// injected into every chat turn while active, optional history text, and
/// optional asset paths (avatar, voice reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub history: Option<String>,
    #[serde(default)]
    pub avatar_path: Option<String>,
    #[serde(default)]
    pub voice_reference_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PersonaPayload {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub history: Option<String>,
    #[serde(default)]
    pub avatar_path: Option<String>,
    #[serde(default)]
    pub voice_reference_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ActiveFile {
    active_id: Option<String>,
}

/// File-backed persona CRUD. One persona may be active at a time, tracked
/// in a separate small file so activation never rewrites the full list.
pub struct PersonaStore {
    personas_path: std::path::PathBuf,
    active_path: std::path::PathBuf,
    lock: Mutex<()>,
}

impl PersonaStore {
    pub fn open(data_root: &str) -> Result<Self> {
        std::fs::create_dir_all(data_root)?;
        let store = Self {
            personas_path: std::path::Path::new(data_root).join("personas.json"),
            active_path: std::path::Path::new(data_root).join("active_persona.json"),
            lock: Mutex::new(()),
        };
        store.ensure_files()?;
        Ok(store)
    }

    fn ensure_files(&self) -> Result<()> {
        if !self.personas_path.exists() {
            write_atomic(&self.personas_path, &serde_json::to_vec(&Vec::<Persona>::new())?)?;
        }
        if !self.active_path.exists() {
            write_atomic(&self.active_path, &serde_json::to_vec(&ActiveFile::default())?)?;
        }
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Persona>> {
        let bytes = std::fs::read(&self.personas_path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_all(&self, personas: &[Persona]) -> Result<()> {
        write_atomic(&self.personas_path, &serde_json::to_vec_pretty(personas)?)
    }

    fn load_active(&self) -> Result<ActiveFile> {
        let bytes = std::fs::read(&self.active_path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save_active(&self, active: &ActiveFile) -> Result<()> {
        write_atomic(&self.active_path, &serde_json::to_vec_pretty(active)?)
    }

    pub fn get_all(&self) -> Result<Vec<Persona>> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        self.load_all()
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Persona>> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        Ok(self.load_all()?.into_iter().find(|p| p.id == id))
    }

    pub fn create(&self, payload: PersonaPayload) -> Result<Persona> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        let mut personas = self.load_all()?;
        let now = Utc::now().to_rfc3339();
        let persona = Persona {
            id: uuid::Uuid::new_v4().to_string(),
            name: payload.name,
            system_prompt: payload.system_prompt,
            history: payload.history,
            avatar_path: payload.avatar_path,
            voice_reference_path: payload.voice_reference_path,
            created_at: now.clone(),
            updated_at: now,
        };
        personas.push(persona.clone());
        self.save_all(&personas)?;
        Ok(persona)
    }

    pub fn update(&self, id: &str, payload: PersonaPayload) -> Result<Option<Persona>> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        let mut personas = self.load_all()?;
        let Some(existing) = personas.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        existing.name = payload.name;
        existing.system_prompt = payload.system_prompt;
        existing.history = payload.history;
        existing.avatar_path = payload.avatar_path;
        existing.voice_reference_path = payload.voice_reference_path;
        existing.updated_at = Utc::now().to_rfc3339();
        let updated = existing.clone();
        self.save_all(&personas)?;
        Ok(Some(updated))
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        let mut personas = self.load_all()?;
        let before = personas.len();
        personas.retain(|p| p.id != id);
        if personas.len() == before {
            return Ok(false);
        }
        self.save_all(&personas)?;

        let mut active = self.load_active()?;
        if active.active_id.as_deref() == Some(id) {
            active.active_id = None;
            self.save_active(&active)?;
        }
        Ok(true)
    }

    pub fn active_id(&self) -> Result<Option<String>> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        Ok(self.load_active()?.active_id)
    }

    pub fn activate(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().expect("persona store mutex poisoned");
        if !self.load_all()?.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        self.save_active(&ActiveFile {
            active_id: Some(id.to_string()),
        })?;
        Ok(true)
    }

    pub fn active_persona(&self) -> Result<Option<Persona>> {
        let Some(id) = self.active_id()? else {
            return Ok(None);
        };
        self.get_by_id(&id)
    }
}

/// Write-temp-then-rename, matching the cold-tier archival writer — a
/// crash mid-write never leaves a half-written persona file on disk.
fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_update_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersonaStore::open(dir.path().to_str().unwrap()).unwrap();

        let created = store
            .create(PersonaPayload {
                name: "Assistant".to_string(),
                system_prompt: "Be helpful.".to_string(),
                history: None,
                avatar_path: None,
                voice_reference_path: None,
            })
            .unwrap();

        assert_eq!(store.get_all().unwrap().len(), 1);
        assert!(store.get_by_id(&created.id).unwrap().is_some());

        let updated = store
            .update(
                &created.id,
                PersonaPayload {
                    name: "Updated".to_string(),
                    system_prompt: "Be very helpful.".to_string(),
                    history: None,
                    avatar_path: None,
                    voice_reference_path: None,
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Updated");

        assert!(store.activate(&created.id).unwrap());
        assert_eq!(store.active_id().unwrap(), Some(created.id.clone()));

        assert!(store.delete(&created.id).unwrap());
        assert_eq!(store.active_id().unwrap(), None);
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn activating_unknown_id_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersonaStore::open(dir.path().to_str().unwrap()).unwrap();
        assert!(!store.activate("nonexistent").unwrap());
    }
}
