//! Auto-pause, auto-resume and delayed auto-leave driven by voice presence.
//!
//! When the last listener leaves the session's channel, playback pauses and
//! an idle countdown starts. Anyone coming back before it expires resumes
//! playback; otherwise the session leaves the channel.

use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{debug, info};

use crate::audio::{
    idle::IdleTimer,
    session::{PlaybackState, Session},
    track::Track,
};

/// A member moved between voice channels (either side may be `None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub old_channel: Option<ChannelId>,
    pub new_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceAction {
    /// Nothing changed.
    Unchanged,
    /// Everyone left; paused and counting down.
    AutoPaused,
    /// Someone came back; countdown cancelled and playback resumed.
    /// Carries the track that started if the queue had been idle.
    AutoResumed(Option<Track>),
    /// Connected but nothing ever started, and the channel emptied.
    IdleCountdown,
}

impl Session {
    /// The session's channel if `change` touches it and the session is ready.
    pub fn watched_channel(&self, change: &PresenceChange) -> Option<ChannelId> {
        if !self.is_ready() {
            return None;
        }
        let channel = self.voice_channel()?;
        (change.old_channel == Some(channel) || change.new_channel == Some(channel))
            .then_some(channel)
    }

    /// Applies the occupancy policy given the number of non-bot members now
    /// in the session's channel. `start_timer` arms the idle countdown with
    /// the id it is given.
    pub async fn on_occupancy(
        &mut self,
        listeners: usize,
        start_timer: impl FnOnce(u64) -> IdleTimer,
    ) -> PresenceAction {
        match self.state() {
            PlaybackState::Playing if listeners == 0 => {
                if self.pause().await.is_err() {
                    return PresenceAction::Unchanged;
                }
                self.mark_auto_paused();
                self.arm_idle_timer(start_timer);
                info!("💤 Guild {} auto-paused, channel is empty", self.guild_id());
                PresenceAction::AutoPaused
            }
            PlaybackState::Paused if self.is_auto_paused() && listeners > 0 => {
                match self.resume().await {
                    Ok(started) => {
                        info!("👋 Guild {} auto-resumed, {} listener(s)", self.guild_id(), listeners);
                        PresenceAction::AutoResumed(started)
                    }
                    Err(_) => PresenceAction::Unchanged,
                }
            }
            // Connected, but the lookup that prompted the join never enqueued anything
            PlaybackState::Joining if listeners == 0 && self.idle_timer_id().is_none() => {
                self.arm_idle_timer(start_timer);
                info!("💤 Guild {} waiting in an empty channel", self.guild_id());
                PresenceAction::IdleCountdown
            }
            PlaybackState::Joining if listeners > 0 && self.idle_timer_id().is_some() => {
                self.cancel_idle_timer();
                debug!("Guild {} has listeners again, countdown cancelled", self.guild_id());
                PresenceAction::Unchanged
            }
            state => {
                debug!(
                    "Guild {} occupancy {} in state {:?}, nothing to do",
                    self.guild_id(),
                    listeners,
                    state
                );
                PresenceAction::Unchanged
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        session::{tests::{track, TEXT, VOICE}, Advance},
        sink::testing::RecordingSink,
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    const IDLE: Duration = Duration::from_secs(300);

    async fn playing_session() -> Session {
        let mut session = Session::new(GuildId::new(1));
        session
            .begin_join(VOICE, TEXT, Arc::new(RecordingSink::default()))
            .unwrap();
        session.complete_join(VOICE).await.unwrap();
        session.enqueue(vec![track("T1"), track("T2")]).await;
        session
    }

    fn change(old: Option<u64>, new: Option<u64>) -> PresenceChange {
        PresenceChange {
            guild_id: GuildId::new(1),
            user_id: UserId::new(42),
            old_channel: old.map(ChannelId::new),
            new_channel: new.map(ChannelId::new),
        }
    }

    #[tokio::test]
    async fn unrelated_channels_are_ignored() {
        let session = playing_session().await;
        assert_eq!(session.watched_channel(&change(Some(7), Some(8))), None);
        assert_eq!(session.watched_channel(&change(Some(100), None)), Some(VOICE));
        assert_eq!(session.watched_channel(&change(None, Some(100))), Some(VOICE));

        let idle = Session::new(GuildId::new(1));
        assert_eq!(idle.watched_channel(&change(Some(100), None)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_channel_pauses_then_return_resumes() {
        let mut session = playing_session().await;

        let action = session
            .on_occupancy(0, |id| IdleTimer::start(id, IDLE, || {}))
            .await;
        assert_eq!(action, PresenceAction::AutoPaused);
        assert_eq!(session.state(), PlaybackState::Paused);
        assert!(session.idle_timer_id().is_some());

        let action = session
            .on_occupancy(1, |_| unreachable!("no timer on resume"))
            .await;
        assert_eq!(action, PresenceAction::AutoResumed(None));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.idle_timer_id(), None);
        assert_eq!(session.current().map(|t| t.title().to_string()), Some("T1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_out_of_auto_pause_ends_the_countdown() {
        let mut session = playing_session().await;
        session
            .on_occupancy(0, |id| IdleTimer::start(id, IDLE, || {}))
            .await;
        let armed = session.idle_timer_id().unwrap();

        session.skip().await.unwrap();

        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.idle_timer_id(), None);
        assert!(!session.is_auto_paused());

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert!(!session.on_idle_timeout(armed));
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.current().map(|t| t.title().to_string()), Some("T2".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn connected_session_that_never_played_still_leaves() {
        let mut session = Session::new(GuildId::new(1));
        session
            .begin_join(VOICE, TEXT, Arc::new(RecordingSink::default()))
            .unwrap();
        session.complete_join(VOICE).await.unwrap();

        let action = session
            .on_occupancy(0, |id| IdleTimer::start(id, IDLE, || {}))
            .await;
        assert_eq!(action, PresenceAction::IdleCountdown);
        assert_eq!(session.state(), PlaybackState::Joining);

        session.on_occupancy(1, |_| unreachable!("already counting")).await;
        assert_eq!(session.idle_timer_id(), None);

        session
            .on_occupancy(0, |id| IdleTimer::start(id, IDLE, || {}))
            .await;
        let armed = session.idle_timer_id().unwrap();
        assert!(session.on_idle_timeout(armed));
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_of_the_last_track_while_auto_paused_ends_the_countdown() {
        let mut session = playing_session().await;
        session.skip().await.unwrap();
        session
            .on_occupancy(0, |id| IdleTimer::start(id, IDLE, || {}))
            .await;

        assert_eq!(session.skip().await.unwrap(), Advance::Drained);
        assert_eq!(session.idle_timer_id(), None);
        assert!(!session.is_auto_paused());
    }

    #[tokio::test]
    async fn manual_pause_is_not_auto_resumed() {
        let mut session = playing_session().await;
        session.pause().await.unwrap();

        let action = session
            .on_occupancy(3, |_| unreachable!("no timer while manually paused"))
            .await;

        assert_eq!(action, PresenceAction::Unchanged);
        assert_eq!(session.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn members_present_while_playing_changes_nothing() {
        let mut session = playing_session().await;
        let action = session
            .on_occupancy(2, |_| unreachable!("channel is not empty"))
            .await;
        assert_eq!(action, PresenceAction::Unchanged);
        assert_eq!(session.state(), PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_is_reported_once() {
        let mut session = playing_session().await;
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        session
            .on_occupancy(0, move |id| {
                IdleTimer::start(id, IDLE, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .await;

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let timer_id = session.idle_timer_id().unwrap();
        assert!(session.on_idle_timeout(timer_id));
        assert_eq!(session.state(), PlaybackState::Idle);
    }
}
