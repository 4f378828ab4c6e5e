//! Scripted sessions: ordered items, each a short list of actions.
//!
//! The first action of an item is usually the main question, the rest are
//! supporting answers the operator can fire during the conversation.

use crate::error::StoreError;
use crate::instruction::{Action, lenient_uuid};
use crate::store::{Record, Store, remove_backing_file};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};
use uuid::Uuid;

pub type SessionStore = Store<Session>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Session {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub items: Vec<SessionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionItem {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub actions: Vec<Action>,
}

impl Session {
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.items.iter().flat_map(|item| item.actions.iter())
    }
}

impl Record for Session {
    const KIND: &'static str = "session";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn group(&self) -> &str {
        ""
    }

    fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    fn backing_files(&self) -> Vec<&str> {
        self.actions().flat_map(Action::owned_files).collect()
    }

    fn prepare(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        for item in &mut self.items {
            if item.id.is_nil() {
                item.id = Uuid::new_v4();
            }
            item.actions.iter_mut().for_each(Action::normalize);
        }
    }
}

impl Store<Session> {
    /// Finds the action that has `id` as its own identifier or as the
    /// identifier of one of its sub-items.
    pub async fn find_action(&self, id: Uuid) -> Option<Action> {
        self.find_map(|session| session.actions().find(|a| a.contains_id(id)).cloned())
            .await
    }

    /// Removes one action from the session item holding it and deletes the
    /// action's audio and image files. A file that cannot be removed is
    /// logged; the action stays removed.
    pub async fn delete_action(&self, id: Uuid) -> Result<Action, StoreError> {
        let removed = self
            .modify_first(
                |session| session.actions().any(|a| a.id == id),
                |session| {
                    session.items.iter_mut().find_map(|item| {
                        let index = item.actions.iter().position(|a| a.id == id)?;
                        Some(item.actions.remove(index))
                    })
                },
            )
            .await?
            .flatten()
            .ok_or_else(|| StoreError::NotFound {
                kind: "action",
                key: id.to_string(),
            })?;

        for file in removed.owned_files() {
            if let Err(e) = remove_backing_file(Path::new(file)).await {
                warn!(error = %e, action = %id, "Failed to remove a file of the deleted action");
            }
        }
        debug!(action = %id, "Session action deleted");
        Ok(removed)
    }
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Say, ShowImage};
    use tempfile::TempDir;

    fn question(phrase: &str) -> Action {
        Action {
            name: phrase.to_string(),
            say_item: Some(Say {
                phrase: phrase.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_nested_ids() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load(dir.path().join("sessions.json")).await.unwrap();

        let id = store
            .create(Session {
                name: "Morning".to_string(),
                items: vec![SessionItem {
                    actions: vec![question("How are you?")],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();

        let session = store.get(id).await.unwrap();
        let item = &session.items[0];
        assert!(!item.id.is_nil());
        let action = &item.actions[0];
        assert!(!action.id.is_nil());
        assert!(!action.say_item.as_ref().unwrap().id.is_nil());
    }

    #[tokio::test]
    async fn test_session_requires_name() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load(dir.path().join("sessions.json")).await.unwrap();
        let result = store.create(Session::default()).await;
        assert!(matches!(result, Err(StoreError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_find_action_by_sub_item_id() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load(dir.path().join("sessions.json")).await.unwrap();
        let id = store
            .create(Session {
                name: "Quiz".to_string(),
                items: vec![SessionItem {
                    actions: vec![question("Ready?"), question("Great!")],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        let answer = store.get(id).await.unwrap().items[0].actions[1].clone();
        let say_id = answer.say_item.as_ref().unwrap().id;

        assert_eq!(store.find_action(answer.id).await, Some(answer.clone()));
        assert_eq!(store.find_action(say_id).await, Some(answer));
        assert_eq!(store.find_action(Uuid::new_v4()).await, None);
    }

    #[tokio::test]
    async fn test_delete_action_removes_it_and_its_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        let store = SessionStore::load(&path).await.unwrap();
        let clip = dir.path().join("answer.mp3");
        std::fs::write(&clip, b"ID3").unwrap();
        let mut answer = question("Great!");
        answer.say_item.as_mut().unwrap().file_path = clip.to_string_lossy().into_owned();

        let id = store
            .create(Session {
                name: "Quiz".to_string(),
                items: vec![SessionItem {
                    actions: vec![question("Ready?"), answer],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        let answer_id = store.get(id).await.unwrap().items[0].actions[1].id;

        let removed = store.delete_action(answer_id).await.unwrap();
        assert_eq!(removed.name, "Great!");
        assert!(!clip.exists());

        let reloaded = SessionStore::load(&path).await.unwrap();
        let actions = &reloaded.get(id).await.unwrap().items[0].actions;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name, "Ready?");
    }

    #[tokio::test]
    async fn test_delete_unknown_action_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load(dir.path().join("sessions.json")).await.unwrap();
        let result = store.delete_action(Uuid::new_v4()).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_action_keeps_going_when_file_is_locked() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::load(dir.path().join("sessions.json")).await.unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("inner"), b"x").unwrap();
        let mut action = question("Look");
        action.image_item = Some(ShowImage {
            file_path: blocker.to_string_lossy().into_owned(),
            ..Default::default()
        });

        let id = store
            .create(Session {
                name: "Pictures".to_string(),
                items: vec![SessionItem {
                    actions: vec![action],
                    ..Default::default()
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        let action_id = store.get(id).await.unwrap().items[0].actions[0].id;

        store.delete_action(action_id).await.unwrap();
        assert_eq!(store.find_action(action_id).await, None);
    }

    #[test]
    fn test_backing_files_cover_all_actions() {
        let mut with_image = question("Look");
        with_image.image_item = Some(ShowImage {
            file_path: "data/uploads/cat.png".to_string(),
            ..Default::default()
        });
        let mut with_audio = question("Listen");
        with_audio.say_item.as_mut().unwrap().file_path = "data/uploads/a.mp3".to_string();

        let session = Session {
            name: "Media".to_string(),
            items: vec![
                SessionItem {
                    actions: vec![with_image],
                    ..Default::default()
                },
                SessionItem {
                    actions: vec![with_audio],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(
            session.backing_files(),
            vec!["data/uploads/cat.png", "data/uploads/a.mp3"]
        );
    }

    #[test]
    fn test_null_items_decode_as_empty() {
        let session: Session =
            serde_json::from_str(r#"{"ID": "00000000-0000-0000-0000-000000000000", "Name": "x", "Items": null}"#)
                .unwrap();
        assert!(session.items.is_empty());
    }
}
