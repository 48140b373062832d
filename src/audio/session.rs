use serenity::model::id::{ChannelId, GuildId};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        idle::IdleTimer,
        queue::{MusicQueue, QueueInfo},
        sink::AudioSink,
        track::Track,
    },
    error::{MusicError, MusicResult},
};

const NOT_PLAYING: &str = "> currently not playing any song";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Joining,
    Playing,
    Paused,
}

/// What happened when the session moved on from its current track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A different track was loaded.
    Started(Track),
    /// Loop is on and the current track was restarted.
    Replayed(Track),
    /// Nothing left to play; the session stays in the channel.
    Drained,
}

/// One guild's queue, playback state and voice occupancy.
///
/// All mutation happens on the dispatcher task, so methods take `&mut self`
/// and nothing here is shared. The session owns its [`AudioSink`] for as
/// long as it holds a voice channel.
pub struct Session {
    guild_id: GuildId,
    queue: MusicQueue,
    current: Option<Track>,
    state: PlaybackState,
    voice_channel: Option<ChannelId>,
    text_channel: Option<ChannelId>,
    connected: bool,
    loop_track: bool,
    repeat: bool,
    auto_paused: bool,
    idle_timer: Option<IdleTimer>,
    next_timer_id: u64,
    generation: u64,
    sink: Option<Arc<dyn AudioSink>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("guild_id", &self.guild_id)
            .field("state", &self.state)
            .field("voice_channel", &self.voice_channel)
            .field("current", &self.current.as_ref().map(Track::title))
            .field("pending", &self.queue.len())
            .field("loop", &self.loop_track)
            .field("repeat", &self.repeat)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            queue: MusicQueue::new(),
            current: None,
            state: PlaybackState::Idle,
            voice_channel: None,
            text_channel: None,
            connected: false,
            loop_track: false,
            repeat: false,
            auto_paused: false,
            idle_timer: None,
            next_timer_id: 0,
            generation: 0,
            sink: None,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &MusicQueue {
        &self.queue
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.voice_channel
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.text_channel
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_track
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat
    }

    pub fn is_auto_paused(&self) -> bool {
        self.auto_paused
    }

    pub fn idle_timer_id(&self) -> Option<u64> {
        self.idle_timer.as_ref().map(IdleTimer::id)
    }

    /// Holds a voice channel with a confirmed connection.
    pub fn is_ready(&self) -> bool {
        self.voice_channel.is_some() && self.connected
    }

    pub fn holds(&self, channel_id: ChannelId) -> bool {
        self.voice_channel == Some(channel_id)
    }

    /// Idle → Joining. The sink is attached here and connected by the caller.
    pub fn begin_join(
        &mut self,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        sink: Arc<dyn AudioSink>,
    ) -> MusicResult<()> {
        if self.state != PlaybackState::Idle {
            return Err(MusicError::conflict("> I am already in a voice channel"));
        }

        info!("🔊 Guild {} joining voice channel {}", self.guild_id, voice_channel);
        self.voice_channel = Some(voice_channel);
        self.text_channel = Some(text_channel);
        self.sink = Some(sink);
        self.connected = false;
        self.state = PlaybackState::Joining;
        Ok(())
    }

    /// Confirms the connection made for `begin_join`. Starts the first
    /// queued track if anything was enqueued while connecting.
    pub async fn complete_join(&mut self, voice_channel: ChannelId) -> MusicResult<Option<Track>> {
        if self.state != PlaybackState::Joining || !self.holds(voice_channel) {
            return Err(MusicError::conflict("> the voice connection is no longer needed"));
        }

        info!("✅ Guild {} connected to voice channel {}", self.guild_id, voice_channel);
        self.connected = true;

        if self.queue.is_empty() {
            return Ok(None);
        }

        Ok(started(self.advance().await))
    }

    /// Reverts a failed join to Idle.
    pub fn fail_join(&mut self) {
        warn!("❌ Guild {} could not join {:?}", self.guild_id, self.voice_channel);
        self.release_sink();
        self.reset();
    }

    /// Appends tracks in order. Starts playback if the session is in its
    /// channel with nothing loaded.
    pub async fn enqueue(&mut self, tracks: Vec<Track>) -> Option<Track> {
        self.queue.extend(tracks);

        let waiting = matches!(self.state, PlaybackState::Joining | PlaybackState::Playing);
        if self.is_ready() && waiting && self.current.is_none() {
            return started(self.advance().await);
        }
        None
    }

    /// Handles the sink reporting that a track stopped. Events from a
    /// superseded generation return `None`.
    pub async fn on_track_finished(&mut self, generation: u64) -> Option<Advance> {
        if generation != self.generation
            || self.current.is_none()
            || self.state != PlaybackState::Playing
        {
            debug!(
                "Ignoring stale finish event {} for guild {} (current generation {})",
                generation, self.guild_id, self.generation
            );
            return None;
        }

        Some(self.advance().await)
    }

    pub async fn pause(&mut self) -> MusicResult<()> {
        match self.state {
            PlaybackState::Playing => {
                if let Some(sink) = &self.sink {
                    sink.pause().await;
                }
                self.state = PlaybackState::Paused;
                info!("⏸️ Guild {} paused", self.guild_id);
                Ok(())
            }
            PlaybackState::Paused => Err(MusicError::conflict("> already paused")),
            _ => Err(MusicError::conflict(NOT_PLAYING)),
        }
    }

    /// Paused → Playing. If nothing was loaded when the pause happened but
    /// tracks arrived since, the first of them starts and is returned.
    pub async fn resume(&mut self) -> MusicResult<Option<Track>> {
        match self.state {
            PlaybackState::Paused => {
                self.end_auto_pause();
                if let Some(sink) = &self.sink {
                    sink.resume().await;
                }
                self.state = PlaybackState::Playing;
                info!("▶️ Guild {} resumed", self.guild_id);

                if self.current.is_none() && !self.queue.is_empty() {
                    return Ok(started(self.advance().await));
                }
                Ok(None)
            }
            PlaybackState::Playing => Err(MusicError::conflict("> already playing")),
            _ => Err(MusicError::conflict(NOT_PLAYING)),
        }
    }

    /// Stops the current track and moves on exactly as a natural finish would.
    pub async fn skip(&mut self) -> MusicResult<Advance> {
        if !self.has_loaded_track() {
            return Err(MusicError::conflict(NOT_PLAYING));
        }

        self.generation += 1;
        if let Some(sink) = &self.sink {
            sink.stop().await;
        }
        info!("⏭️ Guild {} skipping", self.guild_id);
        Ok(self.advance().await)
    }

    /// Shuffles pending tracks. The current track is not touched.
    pub fn mix(&mut self) {
        self.queue.shuffle();
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_track = enabled;
        info!("🔂 Guild {} loop {}", self.guild_id, on_off(enabled));
    }

    pub fn set_repeat(&mut self, enabled: bool) {
        self.repeat = enabled;
        info!("🔁 Guild {} repeat {}", self.guild_id, on_off(enabled));
    }

    pub async fn seek(&mut self, position: Duration) -> MusicResult<()> {
        let Some(track) = self.current.as_ref().filter(|_| self.has_loaded_track()) else {
            return Err(MusicError::conflict(NOT_PLAYING));
        };

        if position > track.duration() {
            debug!(
                "Seek to {:?} rejected, {} lasts {:?}",
                position,
                track.title(),
                track.duration()
            );
            return Err(MusicError::seek("> could not seek"));
        }

        let accepted = match &self.sink {
            Some(sink) => sink.seek(position).await,
            None => false,
        };
        if !accepted {
            return Err(MusicError::seek("> could not seek"));
        }

        info!("⏩ Guild {} seeked to {:?}", self.guild_id, position);
        Ok(())
    }

    /// Tears the session down to Idle. Loop and repeat flags survive.
    pub fn leave(&mut self) -> MusicResult<()> {
        if self.state == PlaybackState::Idle {
            return Err(MusicError::conflict("> I am not in a voice channel"));
        }

        self.generation += 1;
        self.release_sink();
        info!("👋 Guild {} left voice channel {:?}", self.guild_id, self.voice_channel);
        self.reset();
        Ok(())
    }

    /// Leaves if `timer_id` is the countdown currently armed.
    pub fn on_idle_timeout(&mut self, timer_id: u64) -> bool {
        if self.idle_timer_id() != Some(timer_id) {
            debug!("Ignoring stale idle timer {} for guild {}", timer_id, self.guild_id);
            return false;
        }

        self.idle_timer = None;
        self.leave().is_ok()
    }

    /// Cleans up after the bot was removed from `voice_channel` externally.
    pub fn on_bot_disconnected(&mut self, voice_channel: ChannelId) -> bool {
        if !self.is_ready() || !self.holds(voice_channel) {
            return false;
        }
        warn!("🔌 Guild {} was disconnected from {}", self.guild_id, voice_channel);
        self.leave().is_ok()
    }

    pub fn info(&self) -> QueueInfo {
        let current_duration = self.current.as_ref().map(Track::duration).unwrap_or_default();
        QueueInfo {
            current: self.current.clone(),
            items: self.queue.iter().cloned().collect(),
            loop_track: self.loop_track,
            repeat: self.repeat,
            paused: self.state == PlaybackState::Paused,
            total_duration: self.queue.total_duration() + current_duration,
        }
    }

    /// Replaces any armed countdown with a new one built by `start`.
    pub(crate) fn arm_idle_timer(&mut self, start: impl FnOnce(u64) -> IdleTimer) {
        self.cancel_idle_timer();
        self.next_timer_id += 1;
        self.idle_timer = Some(start(self.next_timer_id));
    }

    pub(crate) fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn mark_auto_paused(&mut self) {
        self.auto_paused = true;
    }

    fn has_loaded_track(&self) -> bool {
        self.current.is_some()
            && matches!(self.state, PlaybackState::Playing | PlaybackState::Paused)
    }

    async fn advance(&mut self) -> Advance {
        if self.loop_track {
            if let Some(track) = self.current.clone() {
                self.play(track.clone()).await;
                return Advance::Replayed(track);
            }
        }

        if let Some(finished) = self.current.take() {
            if self.repeat {
                self.queue.push_back(finished);
            }
        }

        match self.queue.pop_next() {
            Some(next) => {
                self.play(next.clone()).await;
                Advance::Started(next)
            }
            None => {
                self.end_auto_pause();
                self.state = PlaybackState::Playing;
                info!("📭 Guild {} queue finished, staying in channel", self.guild_id);
                Advance::Drained
            }
        }
    }

    async fn play(&mut self, track: Track) {
        self.end_auto_pause();
        self.generation += 1;
        if let Some(sink) = &self.sink {
            sink.play(&track, self.generation).await;
        }
        info!("🎵 Guild {} playing: {}", self.guild_id, track.title());
        self.current = Some(track);
        self.state = PlaybackState::Playing;
    }

    /// Every way back into Playing ends the auto-pause countdown.
    fn end_auto_pause(&mut self) {
        self.cancel_idle_timer();
        self.auto_paused = false;
    }

    /// Disconnects off the caller's task; the session forgets the sink now.
    fn release_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            tokio::spawn(async move { sink.disconnect().await });
        }
    }

    fn reset(&mut self) {
        self.cancel_idle_timer();
        self.queue.clear();
        self.current = None;
        self.voice_channel = None;
        self.text_channel = None;
        self.connected = false;
        self.auto_paused = false;
        self.sink = None;
        self.state = PlaybackState::Idle;
    }
}

fn started(advance: Advance) -> Option<Track> {
    match advance {
        Advance::Started(track) => Some(track),
        _ => None,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
