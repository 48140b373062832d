//! The single task that owns every session.
//!
//! Commands, presence changes, track ends and timer expiries all arrive as
//! [`DispatchEvent`]s on one channel and are handled one at a time, so a
//! session is only ever touched from here. Anything that waits on the
//! network is spawned and reports back with a continuation event; the
//! continuation re-checks the session before applying its result.

use flume::{Receiver, Sender};
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        idle::IdleTimer,
        occupancy::{PresenceAction, PresenceChange},
        registry::SessionRegistry,
        session::{Advance, PlaybackState, Session},
        sink::{AudioBackend, FinishedCallback},
        track::Track,
    },
    bot::{
        commands::{Command, CommandTable, Origin},
        gateway::{Admission, CommandGateway},
        platform::{CommandRequest, Platform, Responder},
    },
    config::Config,
    error::{MusicError, MusicResult, ResolutionError},
    sources::{Lookup, Resolved, TrackResolver},
    ui::{Enqueued, NowPlaying, Reply},
};

const EVERYONE_LEFT: &str =
    "> To save resources, I have paused the queue since everyone has left my voice channel.";
const SOMEONE_JOINED: &str =
    "> There has been a new participant in my voice channel, and the queue will be resumed. Enjoy the music 🎶";
const DROPPED: &str = "> The music session ended before your tracks were ready, nothing was enqueued";
const NOTHING_PLAYING: &str = "> currently not playing any song";
const COULD_NOT_SEEK: &str = "> could not seek";

pub enum DispatchEvent {
    Command(CommandRequest),
    Presence(PresenceChange),
    /// The bot was removed from `channel_id` by someone else.
    BotDisconnected {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    TrackFinished {
        guild_id: GuildId,
        generation: u64,
    },
    IdleTimeout {
        guild_id: GuildId,
        timer_id: u64,
    },
    /// Outcome of the voice connection started by a join.
    Connected {
        guild_id: GuildId,
        channel_id: ChannelId,
        responder: Arc<dyn Responder>,
        result: MusicResult<()>,
    },
    /// Outcome of a lookup started while the session held `channel_id`.
    Resolved {
        guild_id: GuildId,
        channel_id: ChannelId,
        responder: Arc<dyn Responder>,
        result: Result<Resolved, ResolutionError>,
    },
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub idle_timeout: Duration,
    pub notice_ttl: Duration,
    pub resolve_timeout: Duration,
}

impl From<&Config> for DispatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            notice_ttl: config.notice_ttl,
            resolve_timeout: config.resolve_timeout,
        }
    }
}

/// How a command is answered once it ran.
enum Outcome {
    Reply(Reply),
    Acknowledge,
    /// A spawned lookup will answer.
    Pending,
}

fn done(origin: Origin, text: &str) -> Outcome {
    match origin {
        Origin::Slash => Outcome::Reply(Reply::text(text)),
        Origin::Button => Outcome::Acknowledge,
    }
}

/// Posts messages to text channels without blocking the dispatcher.
struct Announcer {
    platform: Arc<dyn Platform>,
}

impl Announcer {
    fn send(&self, channel_id: Option<ChannelId>, reply: Reply) {
        let Some(channel_id) = channel_id else {
            debug!("No text channel to announce in");
            return;
        };
        let platform = self.platform.clone();
        tokio::spawn(async move {
            if let Err(e) = platform.announce(channel_id, reply).await {
                error!("Failed to announce in {}: {:?}", channel_id, e);
            }
        });
    }

    /// Control message for a track that just started.
    fn started(&self, session: &Session, track: Option<Track>) {
        if let Some(track) = track {
            self.send(
                session.text_channel(),
                Reply::NowPlaying(NowPlaying {
                    track,
                    pending: session.queue().len(),
                    loop_track: session.loop_enabled(),
                    repeat: session.repeat_enabled(),
                }),
            );
        }
    }
}

fn defer(responder: &Arc<dyn Responder>) {
    let responder = responder.clone();
    tokio::spawn(async move {
        if let Err(e) = responder.defer().await {
            error!("Failed to defer interaction: {:?}", e);
        }
    });
}

fn deliver(responder: &Arc<dyn Responder>, reply: Reply) {
    let responder = responder.clone();
    tokio::spawn(async move {
        if let Err(e) = responder.reply(reply).await {
            error!("Failed to reply to interaction: {:?}", e);
        }
    });
}

fn acknowledge(responder: &Arc<dyn Responder>) {
    let responder = responder.clone();
    tokio::spawn(async move {
        if let Err(e) = responder.acknowledge().await {
            error!("Failed to acknowledge interaction: {:?}", e);
        }
    });
}

fn finished_callback(events: Sender<DispatchEvent>, guild_id: GuildId) -> FinishedCallback {
    Arc::new(move |generation| {
        if events
            .send(DispatchEvent::TrackFinished { guild_id, generation })
            .is_err()
        {
            warn!("Dispatcher gone, dropping track end for guild {}", guild_id);
        }
    })
}

fn enqueued_view(resolved: &Resolved) -> Enqueued {
    match resolved {
        Resolved::Single(track) => Enqueued::Track(track.clone()),
        Resolved::Playlist(playlist) => Enqueued::Playlist {
            title: playlist.title.clone(),
            thumbnail: playlist.thumbnail.clone(),
            count: playlist.tracks.len(),
        },
        Resolved::Spotify(tracks) => Enqueued::Spotify { count: tracks.len() },
    }
}

pub struct Dispatcher {
    registry: SessionRegistry,
    gateway: CommandGateway,
    announcer: Announcer,
    platform: Arc<dyn Platform>,
    backend: Arc<dyn AudioBackend>,
    resolver: Arc<dyn TrackResolver>,
    settings: DispatchSettings,
    events: Sender<DispatchEvent>,
    inbox: Receiver<DispatchEvent>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        (events, inbox): (Sender<DispatchEvent>, Receiver<DispatchEvent>),
        platform: Arc<dyn Platform>,
        backend: Arc<dyn AudioBackend>,
        resolver: Arc<dyn TrackResolver>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            gateway: CommandGateway::new(CommandTable::new()),
            announcer: Announcer {
                platform: platform.clone(),
            },
            platform,
            backend,
            resolver,
            settings,
            events,
            inbox,
        }
    }

    pub async fn run(mut self) {
        info!("🚦 Dispatcher started");
        let inbox = self.inbox.clone();
        while let Ok(event) = inbox.recv_async().await {
            self.handle(event).await;
        }
        warn!("Dispatcher channel closed");
    }

    pub async fn handle(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Command(request) => self.on_command(request).await,
            DispatchEvent::Presence(change) => self.on_presence(change).await,
            DispatchEvent::BotDisconnected { guild_id, channel_id } => {
                if let Some(session) = self.registry.get_mut(guild_id) {
                    session.on_bot_disconnected(channel_id);
                }
            }
            DispatchEvent::TrackFinished { guild_id, generation } => {
                let Some(session) = self.registry.get_mut(guild_id) else {
                    return;
                };
                if let Some(Advance::Started(track)) = session.on_track_finished(generation).await {
                    self.announcer.started(session, Some(track));
                }
            }
            DispatchEvent::IdleTimeout { guild_id, timer_id } => {
                let Some(session) = self.registry.get_mut(guild_id) else {
                    return;
                };
                let text_channel = session.text_channel();
                if session.on_idle_timeout(timer_id) {
                    self.announcer.send(
                        text_channel,
                        Reply::text(format!(
                            "> My voice channel has been open for {} and no one has joined, so the queue has been deleted.",
                            humantime::format_duration(self.settings.idle_timeout)
                        )),
                    );
                }
            }
            DispatchEvent::Connected {
                guild_id,
                channel_id,
                responder,
                result,
            } => self.on_connected(guild_id, channel_id, responder, result).await,
            DispatchEvent::Resolved {
                guild_id,
                channel_id,
                responder,
                result,
            } => self.on_resolved(guild_id, channel_id, responder, result).await,
        }
    }

    async fn on_command(&mut self, request: CommandRequest) {
        let responder = request.responder.clone();

        let admission = match self.gateway.admit(&request, &mut self.registry) {
            Ok(admission) => admission,
            Err(e) => {
                debug!("Rejected {} ({}): {}", request.id, e.kind(), e);
                deliver(
                    &responder,
                    Reply::Notice {
                        text: e.to_string(),
                        ttl: self.settings.notice_ttl,
                    },
                );
                return;
            }
        };

        info!(
            "🎛️ {} from {} in guild {}",
            request.id, admission.member, admission.guild_id
        );

        let origin = admission.origin;
        match self.execute(admission, &responder).await {
            Ok(Outcome::Reply(reply)) => deliver(&responder, reply),
            Ok(Outcome::Acknowledge) => acknowledge(&responder),
            Ok(Outcome::Pending) => {}
            Err(e) => {
                info!("⚠️ {} failed ({}): {}", request.id, e.kind(), e);
                let reply = match (&e, origin) {
                    (MusicError::Validation(_), _) | (_, Origin::Button) => Reply::Notice {
                        text: e.to_string(),
                        ttl: self.settings.notice_ttl,
                    },
                    _ => Reply::text(e.to_string()),
                };
                deliver(&responder, reply);
            }
        }
    }

    async fn execute(&mut self, admission: Admission, responder: &Arc<dyn Responder>) -> MusicResult<Outcome> {
        let origin = admission.origin;

        let lookup = match &admission.command {
            Command::Play { query } => Some(Lookup::Search(query.clone())),
            Command::Playlist { name } => Some(Lookup::Playlist(name.clone())),
            Command::Spotify { url } => Some(Lookup::Spotify(url.clone())),
            _ => None,
        };
        if let Some(lookup) = lookup {
            return self.start_lookup(&admission, lookup, responder);
        }

        let session = self.registry.get_or_create(admission.guild_id);

        let outcome = match admission.command {
            Command::Skip => {
                if let Advance::Started(track) = session.skip().await? {
                    self.announcer.started(session, Some(track));
                }
                done(origin, "> skipped current song")
            }
            Command::Mix => {
                session.mix();
                done(origin, "> mixed current queue")
            }
            Command::Pause => {
                session.pause().await?;
                done(origin, "> paused music")
            }
            Command::Resume => {
                let started = session.resume().await?;
                self.announcer.started(session, started);
                done(origin, "> resumed music")
            }
            Command::Seek { seconds } => {
                let position =
                    Duration::try_from_secs_f64(seconds).map_err(|_| MusicError::seek(COULD_NOT_SEEK))?;
                session.seek(position).await?;
                done(origin, "> current music seeked")
            }
            Command::Leave => {
                session.leave()?;
                done(origin, "> stopped music")
            }
            Command::TogglePause => {
                if session.state() == PlaybackState::Paused {
                    let started = session.resume().await?;
                    self.announcer.started(session, started);
                } else {
                    session.pause().await?;
                }
                Outcome::Acknowledge
            }
            Command::ToggleLoop => {
                session.set_loop(!session.loop_enabled());
                Outcome::Acknowledge
            }
            Command::ToggleRepeat => {
                session.set_repeat(!session.repeat_enabled());
                Outcome::Acknowledge
            }
            Command::ViewQueue => Outcome::Reply(Reply::Queue(session.info())),
            Command::Controls => {
                let track = session
                    .current()
                    .cloned()
                    .ok_or_else(|| MusicError::conflict(NOTHING_PLAYING))?;
                self.announcer.started(session, Some(track));
                Outcome::Acknowledge
            }
            Command::Play { .. } | Command::Playlist { .. } | Command::Spotify { .. } => Outcome::Pending,
        };

        Ok(outcome)
    }

    /// Joins if needed, then resolves off the dispatcher. Both steps
    /// report back as events.
    fn start_lookup(
        &mut self,
        admission: &Admission,
        lookup: Lookup,
        responder: &Arc<dyn Responder>,
    ) -> MusicResult<Outcome> {
        let guild_id = admission.guild_id;
        let session = self.registry.get_or_create(guild_id);

        let connect = if admission.needs_join {
            let sink = self
                .backend
                .create_sink(guild_id, finished_callback(self.events.clone(), guild_id));
            session.begin_join(admission.voice_channel, admission.text_channel, sink.clone())?;
            Some(sink)
        } else {
            None
        };

        let channel_id = session
            .voice_channel()
            .ok_or_else(|| MusicError::conflict("> I am not in a voice channel"))?;

        defer(responder);

        let events = self.events.clone();
        let resolver = self.resolver.clone();
        let responder = responder.clone();
        let timeout = self.settings.resolve_timeout;
        let member = admission.member;

        tokio::spawn(async move {
            if let Some(sink) = connect {
                let result = sink.connect(channel_id).await;
                let failed = result.is_err();
                let connected = DispatchEvent::Connected {
                    guild_id,
                    channel_id,
                    responder: responder.clone(),
                    result,
                };
                if events.send(connected).is_err() || failed {
                    return;
                }
            }

            debug!("🔍 Resolving {:?} for guild {}", lookup, guild_id);
            let result = match tokio::time::timeout(timeout, lookup.run(resolver.as_ref(), member)).await {
                Ok(result) => result,
                Err(_) => Err(ResolutionError::Backend(format!(
                    "no answer within {}",
                    humantime::format_duration(timeout)
                ))),
            };

            let resolved = DispatchEvent::Resolved {
                guild_id,
                channel_id,
                responder,
                result,
            };
            if events.send(resolved).is_err() {
                warn!("Dispatcher gone, dropping lookup result for guild {}", guild_id);
            }
        });

        Ok(Outcome::Pending)
    }

    async fn on_connected(
        &mut self,
        guild_id: GuildId,
        channel_id: ChannelId,
        responder: Arc<dyn Responder>,
        result: MusicResult<()>,
    ) {
        let Some(session) = self.registry.get_mut(guild_id) else {
            return;
        };

        match result {
            Ok(()) => match session.complete_join(channel_id).await {
                Ok(started) => self.announcer.started(session, started),
                Err(e) => debug!("Connection for guild {} no longer needed: {}", guild_id, e),
            },
            Err(e) => {
                if session.state() == PlaybackState::Joining && session.holds(channel_id) {
                    session.fail_join();
                }
                deliver(&responder, Reply::text(e.to_string()));
            }
        }
    }

    async fn on_resolved(
        &mut self,
        guild_id: GuildId,
        channel_id: ChannelId,
        responder: Arc<dyn Responder>,
        result: Result<Resolved, ResolutionError>,
    ) {
        let resolved = match result {
            Ok(resolved) => resolved,
            Err(e) => {
                info!("🔍 Lookup failed for guild {}: {}", guild_id, e);
                deliver(&responder, Reply::text(MusicError::from(e).to_string()));
                return;
            }
        };

        let session = self.registry.get_or_create(guild_id);
        if session.state() == PlaybackState::Idle || !session.holds(channel_id) {
            info!(
                "🗑️ Dropping {} resolved track(s) for guild {}, session moved on",
                resolved.tracks().len(),
                guild_id
            );
            deliver(&responder, Reply::text(DROPPED));
            return;
        }

        let enqueued = enqueued_view(&resolved);
        let started = session.enqueue(resolved.into_tracks()).await;
        deliver(&responder, Reply::Enqueued(enqueued));
        self.announcer.started(session, started);
    }

    async fn on_presence(&mut self, change: PresenceChange) {
        let guild_id = change.guild_id;
        let Some(session) = self.registry.get_mut(guild_id) else {
            return;
        };
        let Some(channel_id) = session.watched_channel(&change) else {
            return;
        };

        let listeners = self.platform.listeners(guild_id, channel_id);
        let events = self.events.clone();
        let idle_timeout = self.settings.idle_timeout;

        let action = session
            .on_occupancy(listeners, |timer_id| {
                IdleTimer::start(timer_id, idle_timeout, move || {
                    let _ = events.send(DispatchEvent::IdleTimeout { guild_id, timer_id });
                })
            })
            .await;

        match action {
            PresenceAction::AutoPaused => {
                self.announcer.send(session.text_channel(), Reply::text(EVERYONE_LEFT));
            }
            PresenceAction::AutoResumed(started) => {
                self.announcer.send(session.text_channel(), Reply::text(SOMEONE_JOINED));
                self.announcer.started(session, started);
            }
            PresenceAction::IdleCountdown | PresenceAction::Unchanged => {}
        }
    }

    /// Handles everything already queued, including continuations.
    #[cfg(test)]
    pub async fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Ok(event) = self.inbox.try_recv() else {
                break;
            };
            self.handle(event).await;
            handled += 1;
        }
        handled
    }

    #[cfg(test)]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
