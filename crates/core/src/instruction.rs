//! The robot command model.
//!
//! An [`Instruction`] is one of four leaf kinds ([`Say`], [`Move`],
//! [`ShowImage`], [`ShowUrl`]) or the composite [`Action`], which bundles at
//! most one of each. Leaves share a single content resolution path: each one
//! only describes *where* its payload lives through [`ContentSource`], and
//! [`resolve_content`] does the reading.
//!
//! Field names on the JSON side follow the layout of the existing data files
//! (`ID`, `Name`, `FilePath`, ...), so stores written by earlier versions of
//! the tool load unchanged.

use crate::error::InstructionError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Group assigned to an action that arrives without one.
pub const DEFAULT_GROUP: &str = "Default";

/// The command tag understood by the robot application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Container of other commands. Never sent to the robot as such.
    #[serde(rename = "sayAndMove")]
    Action,
    #[serde(rename = "say")]
    Say,
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "show_image")]
    ShowImage,
    #[serde(rename = "show_url")]
    ShowUrl,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Action => "sayAndMove",
            Command::Say => "say",
            Command::Move => "move",
            Command::ShowImage => "show_image",
            Command::ShowUrl => "show_url",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the payload of an instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource<'a> {
    /// Bytes of an inline string.
    Inline(&'a str),
    /// Bytes of a file on disk.
    File(&'a str),
    /// Nothing to resolve; the reason is reported as `ContentUnavailable`.
    Missing(&'static str),
}

/// Reads the payload described by `source`.
pub async fn resolve_content(source: ContentSource<'_>) -> Result<Vec<u8>, InstructionError> {
    match source {
        ContentSource::Inline(text) => Ok(text.as_bytes().to_vec()),
        ContentSource::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| InstructionError::ContentUnavailable(format!("{path}: {e}"))),
        ContentSource::Missing(reason) => Err(InstructionError::ContentUnavailable(reason.into())),
    }
}

/// Behaviour shared by the four leaf instruction kinds.
pub trait Leaf {
    fn command(&self) -> Command;
    fn id(&self) -> Uuid;
    /// Display name; empty for speech.
    fn name(&self) -> &str;
    /// Delay in whole seconds, as stored.
    fn delay(&self) -> i64;
    fn is_valid(&self) -> bool;
    /// True when the item carries no payload fields at all.
    fn is_empty(&self) -> bool;
    fn source(&self) -> ContentSource<'_>;

    fn delay_millis(&self) -> i64 {
        self.delay().saturating_mul(1000)
    }
}

/// A phrase to be spoken, optionally backed by a recorded audio file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Say {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default)]
    pub phrase: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub group: String,
    #[serde(default, deserialize_with = "delay_seconds")]
    pub delay: i64,
}

impl Leaf for Say {
    fn command(&self) -> Command {
        Command::Say
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        ""
    }

    fn delay(&self) -> i64 {
        self.delay
    }

    fn is_valid(&self) -> bool {
        !self.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.phrase.is_empty() && self.file_path.is_empty()
    }

    fn source(&self) -> ContentSource<'_> {
        if !self.phrase.is_empty() {
            ContentSource::Inline(&self.phrase)
        } else if !self.file_path.is_empty() {
            ContentSource::File(&self.file_path)
        } else {
            ContentSource::Missing("phrase and file path are empty")
        }
    }
}

/// A motion, either backed by a motion file or known to the robot by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Move {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default, deserialize_with = "delay_seconds")]
    pub delay: i64,
    #[serde(default)]
    pub group: String,
}

impl Leaf for Move {
    fn command(&self) -> Command {
        Command::Move
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn delay(&self) -> i64 {
        self.delay
    }

    // A name alone is enough: the robot resolves named motions locally.
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.name.is_empty() && self.file_path.is_empty()
    }

    fn source(&self) -> ContentSource<'_> {
        file_source(&self.file_path)
    }
}

/// An image shown on the robot's tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShowImage {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default, deserialize_with = "delay_seconds")]
    pub delay: i64,
    #[serde(default)]
    pub group: String,
}

impl Leaf for ShowImage {
    fn command(&self) -> Command {
        Command::ShowImage
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn delay(&self) -> i64 {
        self.delay
    }

    fn is_valid(&self) -> bool {
        !self.file_path.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.file_path.is_empty()
    }

    fn source(&self) -> ContentSource<'_> {
        file_source(&self.file_path)
    }
}

/// A web page opened on the robot's tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShowUrl {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "URL", default, deserialize_with = "checked_url")]
    pub url: String,
    #[serde(default, deserialize_with = "delay_seconds")]
    pub delay: i64,
    #[serde(default)]
    pub group: String,
}

impl ShowUrl {
    /// Builds a `ShowUrl`, rejecting strings that are not absolute URLs.
    pub fn new(name: impl Into<String>, url: &str) -> Result<Self, url::ParseError> {
        url::Url::parse(url)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.to_string(),
            ..Default::default()
        })
    }
}

impl Leaf for ShowUrl {
    fn command(&self) -> Command {
        Command::ShowUrl
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn delay(&self) -> i64 {
        self.delay
    }

    fn is_valid(&self) -> bool {
        !self.url.is_empty()
    }

    fn is_empty(&self) -> bool {
        self.url.is_empty()
    }

    fn source(&self) -> ContentSource<'_> {
        if self.url.is_empty() {
            ContentSource::Missing("URL is empty")
        } else {
            ContentSource::Inline(&self.url)
        }
    }
}

fn file_source(path: &str) -> ContentSource<'_> {
    if path.is_empty() {
        ContentSource::Missing("file path is missing")
    } else {
        ContentSource::File(path)
    }
}

/// A composite of at most one item of each leaf kind, sent as a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Action {
    #[serde(rename = "ID", default, deserialize_with = "lenient_uuid")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub say_item: Option<Say>,
    #[serde(default)]
    pub move_item: Option<Move>,
    #[serde(default)]
    pub image_item: Option<ShowImage>,
    #[serde(rename = "URLItem", default)]
    pub url_item: Option<ShowUrl>,
}

impl Action {
    /// True when none of the sub-items is present.
    pub fn is_nil(&self) -> bool {
        self.say_item.is_none()
            && self.move_item.is_none()
            && self.image_item.is_none()
            && self.url_item.is_none()
    }

    /// Valid when at least one present sub-item is valid.
    pub fn is_valid(&self) -> bool {
        self.say_item.as_ref().is_some_and(Leaf::is_valid)
            || self.move_item.as_ref().is_some_and(Leaf::is_valid)
            || self.image_item.as_ref().is_some_and(Leaf::is_valid)
            || self.url_item.as_ref().is_some_and(Leaf::is_valid)
    }

    /// Drops sub-items without payload, assigns missing identifiers and
    /// defaults the group.
    pub fn normalize(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
        if self.group.is_empty() {
            self.group = DEFAULT_GROUP.to_string();
        }
        normalize_item(&mut self.say_item, |item| &mut item.id);
        normalize_item(&mut self.move_item, |item| &mut item.id);
        normalize_item(&mut self.image_item, |item| &mut item.id);
        normalize_item(&mut self.url_item, |item| &mut item.id);
    }

    /// True if `id` names this action or one of its sub-items.
    pub fn contains_id(&self, id: Uuid) -> bool {
        self.id == id
            || self.say_item.as_ref().is_some_and(|item| item.id == id)
            || self.move_item.as_ref().is_some_and(|item| item.id == id)
            || self.image_item.as_ref().is_some_and(|item| item.id == id)
            || self.url_item.as_ref().is_some_and(|item| item.id == id)
    }

    /// Media files owned by this action. Motion files belong to the move
    /// store and are left out.
    pub fn owned_files(&self) -> Vec<&str> {
        let say = self.say_item.as_ref().map(|item| item.file_path.as_str());
        let image = self.image_item.as_ref().map(|item| item.file_path.as_str());
        say.into_iter()
            .chain(image)
            .filter(|path| !path.is_empty())
            .collect()
    }
}

fn normalize_item<T: Leaf>(item: &mut Option<T>, id_of: impl Fn(&mut T) -> &mut Uuid) {
    if item.as_ref().is_some_and(Leaf::is_empty) {
        *item = None;
    }
    if let Some(item) = item {
        let id = id_of(item);
        if id.is_nil() {
            *id = Uuid::new_v4();
        }
    }
}

/// Any command that can be handed to [`deliver`](crate::delivery::deliver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Say(Say),
    Move(Move),
    ShowImage(ShowImage),
    ShowUrl(ShowUrl),
    Action(Action),
}

impl Instruction {
    fn leaf(&self) -> Option<&dyn Leaf> {
        match self {
            Instruction::Say(item) => Some(item as &dyn Leaf),
            Instruction::Move(item) => Some(item as &dyn Leaf),
            Instruction::ShowImage(item) => Some(item as &dyn Leaf),
            Instruction::ShowUrl(item) => Some(item as &dyn Leaf),
            Instruction::Action(_) => None,
        }
    }

    pub fn command(&self) -> Command {
        self.leaf().map_or(Command::Action, |leaf| leaf.command())
    }

    pub fn id(&self) -> Uuid {
        match self {
            Instruction::Action(action) => action.id,
            _ => self.leaf().map_or(Uuid::nil(), |leaf| leaf.id()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Instruction::Action(action) => &action.name,
            _ => self.leaf().map_or("", |leaf| leaf.name()),
        }
    }

    pub fn delay_millis(&self) -> i64 {
        self.leaf().map_or(0, |leaf| leaf.delay_millis())
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Instruction::Action(action) => action.is_valid(),
            _ => self.leaf().is_some_and(|leaf| leaf.is_valid()),
        }
    }

    /// Only a composite with nothing inside counts as nil; a leaf that
    /// exists is never nil.
    pub fn is_nil(&self) -> bool {
        match self {
            Instruction::Action(action) => action.is_nil(),
            _ => false,
        }
    }

    pub fn source(&self) -> ContentSource<'_> {
        self.leaf()
            .map_or(ContentSource::Inline(""), |leaf| leaf.source())
    }

    /// Resolves the payload bytes of this instruction.
    pub async fn content(&self) -> Result<Vec<u8>, InstructionError> {
        resolve_content(self.source()).await
    }
}

impl From<Say> for Instruction {
    fn from(item: Say) -> Self {
        Instruction::Say(item)
    }
}

impl From<Move> for Instruction {
    fn from(item: Move) -> Self {
        Instruction::Move(item)
    }
}

impl From<ShowImage> for Instruction {
    fn from(item: ShowImage) -> Self {
        Instruction::ShowImage(item)
    }
}

impl From<ShowUrl> for Instruction {
    fn from(item: ShowUrl) -> Self {
        Instruction::ShowUrl(item)
    }
}

impl From<Action> for Instruction {
    fn from(action: Action) -> Self {
        Instruction::Action(action)
    }
}

// Older clients send identifiers as "" and delays as strings.

pub(crate) fn lenient_uuid<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(Uuid::nil()),
        Some(text) => Uuid::parse_str(text).map_err(serde::de::Error::custom),
    }
}

fn delay_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDelay {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<RawDelay>::deserialize(deserializer)? {
        None => Ok(0),
        Some(RawDelay::Int(seconds)) => Ok(seconds),
        Some(RawDelay::Float(seconds)) => Ok(seconds as i64),
        Some(RawDelay::Text(text)) if text.trim().is_empty() => Ok(0),
        Some(RawDelay::Text(text)) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("delay '{text}' is not a whole number of seconds"))
        }),
    }
}

fn checked_url<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let raw = raw.unwrap_or_default();
    if !raw.is_empty() {
        url::Url::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid URL '{raw}': {e}")))?;
    }
    Ok(raw)
}
