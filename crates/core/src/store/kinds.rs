use super::{Record, Store};
use crate::instruction::{Action, Leaf, Move, Say, ShowImage};
use uuid::Uuid;

pub type MoveStore = Store<Move>;
pub type AudioStore = Store<Say>;
pub type ImageStore = Store<ShowImage>;
pub type ActionStore = Store<Action>;

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

impl Record for Say {
    const KIND: &'static str = "audio";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn is_valid(&self) -> bool {
        Leaf::is_valid(self)
    }

    fn backing_files(&self) -> Vec<&str> {
        non_empty(&self.file_path).into_iter().collect()
    }
}

impl Record for Move {
    const KIND: &'static str = "move";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn is_valid(&self) -> bool {
        Leaf::is_valid(self)
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    fn backing_files(&self) -> Vec<&str> {
        non_empty(&self.file_path).into_iter().collect()
    }
}

impl Record for ShowImage {
    const KIND: &'static str = "image";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn is_valid(&self) -> bool {
        Leaf::is_valid(self)
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    fn backing_files(&self) -> Vec<&str> {
        non_empty(&self.file_path).into_iter().collect()
    }
}

impl Record for Action {
    const KIND: &'static str = "action";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn is_valid(&self) -> bool {
        Action::is_valid(self)
    }

    fn is_nil(&self) -> bool {
        Action::is_nil(self)
    }

    fn unique_key(&self) -> Option<&str> {
        non_empty(&self.name)
    }

    fn backing_files(&self) -> Vec<&str> {
        self.owned_files()
    }

    fn prepare(&mut self) {
        self.normalize();
    }
}
