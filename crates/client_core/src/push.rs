use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::events::{ClientEvent, Toast};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushPermission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl PushMessage {
    /// Messages without any notification text are data-only and not shown.
    pub fn toast_text(&self) -> Option<String> {
        match (self.title.as_deref(), self.body.as_deref()) {
            (Some(title), Some(body)) => Some(format!("{title}\n{body}")),
            (Some(text), None) | (None, Some(text)) => Some(text.to_string()),
            (None, None) => None,
        }
    }
}

#[async_trait]
pub trait PushMessaging: Send + Sync {
    async fn request_permission(&self) -> Result<PushPermission>;
    async fn device_token(&self) -> Result<Option<String>>;
    fn foreground_messages(&self) -> Result<broadcast::Receiver<PushMessage>>;
}

pub struct MissingPushMessaging;

#[async_trait]
impl PushMessaging for MissingPushMessaging {
    async fn request_permission(&self) -> Result<PushPermission> {
        Ok(PushPermission::Denied)
    }

    async fn device_token(&self) -> Result<Option<String>> {
        Err(anyhow!("push messaging is unavailable"))
    }

    fn foreground_messages(&self) -> Result<broadcast::Receiver<PushMessage>> {
        Err(anyhow!("push messaging is unavailable"))
    }
}

/// Registers for push and forwards foreground messages as info toasts.
///
/// Every failure is logged and swallowed: the dashboard keeps working
/// without notifications. Returns the device token when one was issued and
/// the forwarding task when a message stream was available.
pub async fn start_push_forwarding(
    messaging: &dyn PushMessaging,
    events: broadcast::Sender<ClientEvent>,
) -> (Option<String>, Option<JoinHandle<()>>) {
    let token = match messaging.request_permission().await {
        Ok(PushPermission::Granted) => match messaging.device_token().await {
            Ok(Some(token)) => {
                info!("push registration token issued");
                Some(token)
            }
            Ok(None) => {
                warn!("no push registration token available");
                None
            }
            Err(err) => {
                warn!(error = %err, "failed to obtain push registration token");
                None
            }
        },
        Ok(PushPermission::Denied) => {
            warn!("push notification permission not granted");
            None
        }
        Err(err) => {
            warn!(error = %err, "push permission request failed");
            None
        }
    };

    let mut messages = match messaging.foreground_messages() {
        Ok(messages) => messages,
        Err(err) => {
            warn!(error = %err, "failed to subscribe to foreground push messages");
            return (token, None);
        }
    };

    let forwarder = tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(message) => {
                    if let Some(text) = message.toast_text() {
                        let _ = events.send(ClientEvent::Toast(Toast::info(text)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "dropped foreground push messages");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
    (token, Some(forwarder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ToastLevel;

    struct TestPush {
        sender: broadcast::Sender<PushMessage>,
    }

    #[async_trait]
    impl PushMessaging for TestPush {
        async fn request_permission(&self) -> Result<PushPermission> {
            Ok(PushPermission::Granted)
        }

        async fn device_token(&self) -> Result<Option<String>> {
            Ok(Some("device-1".into()))
        }

        fn foreground_messages(&self) -> Result<broadcast::Receiver<PushMessage>> {
            Ok(self.sender.subscribe())
        }
    }

    #[tokio::test]
    async fn foreground_messages_become_info_toasts() {
        let (push_tx, _) = broadcast::channel(8);
        let (events, mut rx) = broadcast::channel(8);
        let push = TestPush {
            sender: push_tx.clone(),
        };

        let (token, forwarder) = start_push_forwarding(&push, events).await;
        assert_eq!(token.as_deref(), Some("device-1"));

        push_tx
            .send(PushMessage {
                title: None,
                body: None,
            })
            .unwrap();
        push_tx
            .send(PushMessage {
                title: Some("New order".into()),
                body: Some("Order #42 was placed".into()),
            })
            .unwrap();
        drop(push);
        drop(push_tx);

        match rx.recv().await.unwrap() {
            ClientEvent::Toast(toast) => {
                assert_eq!(toast.level, ToastLevel::Info);
                assert_eq!(toast.message, "New order\nOrder #42 was placed");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        forwarder.unwrap().await.unwrap();
    }

    #[tokio::test]
    async fn missing_provider_is_not_fatal() {
        let (events, _rx) = broadcast::channel(8);
        let (token, forwarder) = start_push_forwarding(&MissingPushMessaging, events).await;
        assert!(token.is_none());
        assert!(forwarder.is_none());
    }
}
