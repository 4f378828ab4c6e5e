//! Turns an [`Instruction`] into wire frames and writes them to the robot.

use crate::error::DeliveryError;
use crate::frame::Frame;
use crate::instruction::{Action, Instruction, Leaf, resolve_content};
use crate::registry::{Connection, ConnectionRegistry};
use tracing::{debug, instrument, warn};

/// Sends `instruction` over the active connection and returns how many
/// frames were written.
///
/// A composite action is sent as separate frames in a fixed order: speech,
/// motion, image, URL. Only the speech frame and transport failures abort
/// it; a motion, image or URL whose content cannot be read is skipped.
#[instrument(skip_all, fields(command = %instruction.command(), id = %instruction.id()))]
pub async fn deliver(
    instruction: &Instruction,
    registry: &ConnectionRegistry,
) -> Result<usize, DeliveryError> {
    let connection = registry
        .active()
        .await
        .ok_or(DeliveryError::ConnectionUnavailable)?;

    let sent = match instruction {
        Instruction::Action(action) => deliver_action(action, &connection).await?,
        single => {
            let content = match single.content().await {
                Ok(content) => content,
                Err(e) if single.name().is_empty() => return Err(DeliveryError::Ambiguous(e)),
                Err(e) => {
                    debug!(error = %e, "No content, sending by name");
                    Vec::new()
                }
            };
            let frame = Frame::new(single.command(), &content, single.name(), single.delay_millis());
            send(&connection, &frame).await?;
            1
        }
    };

    debug!(frames = sent, "Instruction delivered");
    Ok(sent)
}

async fn deliver_action(action: &Action, connection: &Connection) -> Result<usize, DeliveryError> {
    let mut sent = 0;

    // The phrase is rendered on the robot; the frame only resets its speech state.
    if let Some(say) = &action.say_item {
        send(connection, &Frame::new(say.command(), &[], say.name(), say.delay_millis())).await?;
        sent += 1;
    }

    if let Some(movement) = &action.move_item {
        let content = match resolve_content(movement.source()).await {
            Ok(content) => Some(content),
            Err(e) if movement.name.is_empty() => {
                warn!(error = %e, "Skipping move without content or name");
                None
            }
            Err(_) => Some(Vec::new()),
        };
        if let Some(content) = content {
            send(connection, &leaf_frame(movement, &content)).await?;
            sent += 1;
        }
    }

    if let Some(image) = &action.image_item {
        sent += send_optional(connection, image, "image").await?;
    }
    if let Some(url) = &action.url_item {
        sent += send_optional(connection, url, "URL").await?;
    }

    Ok(sent)
}

/// Sends a leaf whose content is optional within an action.
async fn send_optional<L: Leaf>(
    connection: &Connection,
    leaf: &L,
    what: &'static str,
) -> Result<usize, DeliveryError> {
    match resolve_content(leaf.source()).await {
        Ok(content) => {
            send(connection, &leaf_frame(leaf, &content)).await?;
            Ok(1)
        }
        Err(e) => {
            warn!(error = %e, item = what, "Skipping item with unavailable content");
            Ok(0)
        }
    }
}

fn leaf_frame<L: Leaf + ?Sized>(leaf: &L, content: &[u8]) -> Frame {
    Frame::new(leaf.command(), content, leaf.name(), leaf.delay_millis())
}

async fn send(connection: &Connection, frame: &Frame) -> Result<(), DeliveryError> {
    let text = frame.to_json()?;
    connection
        .send_text(text)
        .await
        .map_err(DeliveryError::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::instruction::{Command, Move, Say, ShowImage, ShowUrl};
    use crate::registry::{FrameSink, MockFrameSink};
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Records every frame written to it.
    #[derive(Clone, Default)]
    struct CapturingSink {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl CapturingSink {
        fn frames(&self) -> Vec<Frame> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameSink for CapturingSink {
        async fn send_text(&mut self, text: String) -> anyhow::Result<()> {
            let frame: Frame = serde_json::from_str(&text)?;
            self.frames.lock().unwrap().push(frame);
            Ok(())
        }
    }

    async fn connected() -> (ConnectionRegistry, CapturingSink) {
        let registry = ConnectionRegistry::new();
        let sink = CapturingSink::default();
        registry.register(Box::new(sink.clone())).await;
        (registry, sink)
    }

    fn url_item() -> ShowUrl {
        ShowUrl::new("docs", "https://example.org/docs").unwrap()
    }

    #[tokio::test]
    async fn test_fails_without_connection() {
        let registry = ConnectionRegistry::new();
        let result = deliver(&Instruction::ShowUrl(url_item()), &registry).await;
        assert!(matches!(result, Err(DeliveryError::ConnectionUnavailable)));
    }

    #[tokio::test]
    async fn test_url_only_action_sends_one_frame() {
        let (registry, sink) = connected().await;
        let action = Action {
            url_item: Some(ShowUrl { delay: 2, ..url_item() }),
            ..Default::default()
        };

        let sent = deliver(&action.into(), &registry).await.unwrap();

        assert_eq!(sent, 1);
        let frames = sink.frames();
        assert_eq!(frames[0].command, Command::ShowUrl);
        assert_eq!(frames[0].payload().unwrap(), b"https://example.org/docs");
        assert_eq!(frames[0].delay, 2000);
    }

    #[tokio::test]
    async fn test_action_frames_are_ordered() {
        let (registry, sink) = connected().await;
        let mut motion = tempfile::NamedTempFile::new().unwrap();
        motion.write_all(b"<anim/>").unwrap();

        let action = Action {
            url_item: Some(url_item()),
            move_item: Some(Move {
                name: "wave".to_string(),
                file_path: motion.path().to_string_lossy().into_owned(),
                ..Default::default()
            }),
            say_item: Some(Say {
                phrase: "Hello".to_string(),
                delay: 1,
                ..Default::default()
            }),
            ..Default::default()
        };

        let sent = deliver(&action.into(), &registry).await.unwrap();

        assert_eq!(sent, 3);
        let frames = sink.frames();
        let commands: Vec<_> = frames.iter().map(|f| f.command).collect();
        assert_eq!(commands, vec![Command::Say, Command::Move, Command::ShowUrl]);
        assert_eq!(frames[0].content, "");
        assert_eq!(frames[0].delay, 1000);
        assert_eq!(frames[1].payload().unwrap(), b"<anim/>");
        assert_eq!(frames[1].name, "wave");
        assert!(frames.iter().all(|f| f.command != Command::Action));
    }

    #[tokio::test]
    async fn test_named_move_without_file_is_sent() {
        let (registry, sink) = connected().await;
        let action = Action {
            move_item: Some(Move {
                name: "animations/Stand/Gestures/Hey_1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(deliver(&action.into(), &registry).await.unwrap(), 1);
        let frames = sink.frames();
        assert_eq!(frames[0].name, "animations/Stand/Gestures/Hey_1");
        assert_eq!(frames[0].content, "");
    }

    #[tokio::test]
    async fn test_single_named_move_without_file_is_sent_by_name() {
        let (registry, sink) = connected().await;
        let movement = Move {
            name: "animations/Stand/Gestures/Hey_1".to_string(),
            delay: 2,
            ..Default::default()
        };

        assert_eq!(deliver(&Instruction::Move(movement), &registry).await.unwrap(), 1);
        let frames = sink.frames();
        assert_eq!(frames[0].command, Command::Move);
        assert_eq!(frames[0].name, "animations/Stand/Gestures/Hey_1");
        assert_eq!(frames[0].content, "");
        assert_eq!(frames[0].delay, 2000);
    }

    #[tokio::test]
    async fn test_unreadable_items_are_skipped_in_action() {
        let (registry, sink) = connected().await;
        let action = Action {
            move_item: Some(Move {
                file_path: "/missing/anim.qianim".to_string(),
                ..Default::default()
            }),
            image_item: Some(ShowImage {
                file_path: "/missing/cat.png".to_string(),
                ..Default::default()
            }),
            url_item: Some(url_item()),
            ..Default::default()
        };

        assert_eq!(deliver(&action.into(), &registry).await.unwrap(), 1);
        assert_eq!(sink.frames()[0].command, Command::ShowUrl);
    }

    #[tokio::test]
    async fn test_single_say_sends_phrase() {
        let (registry, sink) = connected().await;
        let say = Say {
            phrase: "Tere".to_string(),
            ..Default::default()
        };

        assert_eq!(deliver(&say.into(), &registry).await.unwrap(), 1);
        assert_eq!(sink.frames()[0].payload().unwrap(), b"Tere");
    }

    #[tokio::test]
    async fn test_single_without_content_or_name_is_ambiguous() {
        let (registry, sink) = connected().await;
        let image = ShowImage {
            file_path: "/missing/cat.png".to_string(),
            ..Default::default()
        };

        let result = deliver(&image.into(), &registry).await;
        assert!(matches!(result, Err(DeliveryError::Ambiguous(_))));
        assert!(sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_single_named_image_without_file_is_sent_by_name() {
        let (registry, sink) = connected().await;
        let image = ShowImage {
            name: "logo".to_string(),
            file_path: "/missing/logo.png".to_string(),
            ..Default::default()
        };

        assert_eq!(deliver(&image.into(), &registry).await.unwrap(), 1);
        assert_eq!(sink.frames()[0].name, "logo");
    }

    #[tokio::test]
    async fn test_say_failure_aborts_action() {
        let registry = ConnectionRegistry::new();
        let mut sink = MockFrameSink::new();
        sink.expect_send_text()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("socket closed")));
        registry.register(Box::new(sink)).await;

        let action = Action {
            say_item: Some(Say {
                phrase: "Hi".to_string(),
                ..Default::default()
            }),
            url_item: Some(url_item()),
            ..Default::default()
        };

        let result = deliver(&action.into(), &registry).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }
}
