//! Session channel management.
//!
//! Groups the communication channels between the session client, the
//! display surface, the ticker scheduler, and the control layer.

use tokio::sync::{mpsc, watch};

use crate::common::messages::{DisplayLine, EffectBatch, OutboundCommand};

/// Channels held by the session client.
pub struct SessionChannels {
    /// Receiver for locally typed commands (alias expansion applies).
    pub user_input_rx: mpsc::UnboundedReceiver<String>,
    /// Sender side of the shared outbound queue. Cloned by the ticker
    /// scheduler; trigger and user commands enter here too, so dispatch
    /// order is enqueue order across all sources.
    pub outbound_tx: mpsc::UnboundedSender<OutboundCommand>,
    /// Receiver side of the outbound queue; the socket writer drains it.
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    /// Sender for processed lines headed to the display surface.
    pub display_tx: mpsc::UnboundedSender<DisplayLine>,
    /// Sender for rule side effects (match counts, invalid patterns).
    pub effects_tx: mpsc::UnboundedSender<EffectBatch>,
    /// Receiver for the shutdown signal.
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Channels held by the UI side (display surface + command entry).
pub struct UiChannels {
    /// Receiver for lines to display.
    pub display_rx: mpsc::UnboundedReceiver<DisplayLine>,
    /// Receiver for rule side effects, for the rule-set owner to apply.
    pub effects_rx: mpsc::UnboundedReceiver<EffectBatch>,
    /// Sender for locally typed commands.
    pub user_input_tx: mpsc::UnboundedSender<String>,
}

/// Control channels for shutdown coordination.
pub struct ControlChannels {
    /// Sender to trigger shutdown.
    pub shutdown_tx: watch::Sender<bool>,
}

/// Bundle of all channels for one session.
pub struct ChannelBundle {
    pub session: SessionChannels,
    pub ui: UiChannels,
    pub control: ControlChannels,
}

impl ChannelBundle {
    /// Create a new set of session channels.
    pub fn new() -> Self {
        let (user_input_tx, user_input_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (display_tx, display_rx) = mpsc::unbounded_channel();
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            session: SessionChannels {
                user_input_rx,
                outbound_tx,
                outbound_rx,
                display_tx,
                effects_tx,
                shutdown_rx,
            },
            ui: UiChannels {
                display_rx,
                effects_rx,
                user_input_tx,
            },
            control: ControlChannels { shutdown_tx },
        }
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new()
    }
}
