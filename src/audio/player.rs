use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    tracks::TrackHandle,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        sink::{AudioBackend, AudioSink, FinishedCallback},
        track::Track,
    },
    error::{MusicError, MusicResult},
};

/// Hands out songbird-backed sinks sharing one voice manager.
pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdBackend {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume,
        }
    }
}

impl AudioBackend for SongbirdBackend {
    fn create_sink(&self, guild_id: GuildId, on_finished: FinishedCallback) -> Arc<dyn AudioSink> {
        Arc::new(SongbirdSink {
            manager: self.manager.clone(),
            guild_id,
            http: self.http.clone(),
            volume: self.volume,
            on_finished,
            current: Mutex::new(None),
        })
    }
}

/// One guild's songbird call plus the handle of the track it is playing.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    http: reqwest::Client,
    volume: f32,
    on_finished: FinishedCallback,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    fn handle(&self) -> Option<TrackHandle> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn connect(&self, channel_id: ChannelId) -> MusicResult<()> {
        match self.manager.join(self.guild_id, channel_id).await {
            Ok(_) => {
                info!("🔊 Voice connected in guild {} ({})", self.guild_id, channel_id);
                Ok(())
            }
            Err(e) => {
                error!("Voice join failed in guild {}: {:?}", self.guild_id, e);
                Err(MusicError::Connection(e.to_string()))
            }
        }
    }

    async fn play(&self, track: &Track, generation: u64) {
        let Some(call) = self.manager.get(self.guild_id) else {
            warn!("No voice call for guild {}, cannot play {}", self.guild_id, track.title());
            return;
        };

        let input: Input = YoutubeDl::new(self.http.clone(), track.url().to_string()).into();
        let handle = {
            let mut call = call.lock().await;
            call.play_only_input(input)
        };

        if let Err(e) = handle.set_volume(self.volume) {
            warn!("Could not set volume: {:?}", e);
        }

        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = TrackEndNotifier {
                guild_id: self.guild_id,
                generation,
                on_finished: self.on_finished.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                error!("Could not register track event handler: {:?}", e);
            }
        }

        *self.current.lock() = Some(handle);
    }

    async fn pause(&self) {
        if let Some(handle) = self.handle() {
            if let Err(e) = handle.pause() {
                warn!("Pause failed in guild {}: {:?}", self.guild_id, e);
            }
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.handle() {
            if let Err(e) = handle.play() {
                warn!("Resume failed in guild {}: {:?}", self.guild_id, e);
            }
        }
    }

    async fn seek(&self, position: Duration) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };

        match handle.seek_async(position).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Seek to {:?} failed in guild {}: {:?}", position, self.guild_id, e);
                false
            }
        }
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().take() {
            let _ = handle.stop();
        }
    }

    async fn disconnect(&self) {
        self.stop().await;
        if let Err(e) = self.manager.remove(self.guild_id).await {
            debug!("Voice call for guild {} already gone: {:?}", self.guild_id, e);
        }
        info!("👋 Voice disconnected in guild {}", self.guild_id);
    }
}

/// Reports a track end or error back to the session with its generation.
struct TrackEndNotifier {
    guild_id: GuildId,
    generation: u64,
    on_finished: FinishedCallback,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                if let songbird::tracks::PlayMode::Errored(e) = &state.playing {
                    error!("❌ Track error in guild {}: {:?}", self.guild_id, e);
                }
            }
        }

        debug!("Track generation {} finished in guild {}", self.generation, self.guild_id);
        (self.on_finished)(self.generation);
        None
    }
}
