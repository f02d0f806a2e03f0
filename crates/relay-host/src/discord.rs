// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Discord side of the relay, on top of serenity's gateway client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use horde_relay::{
    Author, Availability, ChannelId, ChannelInfo, ChannelKind, ChatError, ChatEvent, ChatPlatform,
    EventSender, InboundMessage, Outbound, Presence, RelayEvent, ScopeId, UserId,
};
use serenity::all::{
    ActivityData, Channel, ChannelType, Client, Context, CreateEmbed, CreateMessage,
    EventHandler, GatewayIntents, GuildId, Http, Message, OnlineStatus, Ready, ShardManager,
};
use serenity::gateway::GatewayError;
use tracing::{debug, info};

/// Close code reported when the session ends because we asked it to.
const CLOSE_NORMAL: u16 = 1000;
/// Close code the gateway uses for a rejected token.
const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

fn request_error(e: serenity::Error) -> ChatError {
    ChatError::Request(e.to_string())
}

fn channel_info(channel: &Channel) -> ChannelInfo {
    match channel {
        Channel::Guild(channel) => ChannelInfo {
            id: ChannelId(channel.id.get()),
            kind: match channel.kind {
                ChannelType::Text | ChannelType::News => ChannelKind::Text {
                    scope: ScopeId(channel.guild_id.get()),
                },
                _ => ChannelKind::Other,
            },
        },
        Channel::Private(channel) => ChannelInfo {
            id: ChannelId(channel.id.get()),
            kind: ChannelKind::Direct,
        },
        other => ChannelInfo {
            id: ChannelId(other.id().get()),
            kind: ChannelKind::Other,
        },
    }
}

struct Handler {
    events: EventSender,
    bot_user: Arc<Mutex<Option<UserId>>>,
}

impl Handler {
    async fn can_manage(ctx: &Context, guild_id: GuildId, msg: &Message) -> bool {
        let member = match msg.member(ctx).await {
            Ok(member) => member,
            Err(e) => {
                debug!("Unable to look up member {}: {e}", msg.author.id);
                return false;
            }
        };
        ctx.cache
            .guild(guild_id)
            .is_some_and(|guild| guild.member_permissions(&member).manage_guild())
    }

    async fn inbound(ctx: &Context, msg: &Message) -> InboundMessage {
        let channel = match msg.channel_id.to_channel(ctx).await {
            Ok(channel) => channel_info(&channel),
            Err(e) => {
                debug!("Unable to look up channel {}: {e}", msg.channel_id);
                ChannelInfo {
                    id: ChannelId(msg.channel_id.get()),
                    kind: ChannelKind::Other,
                }
            }
        };
        let can_manage = match msg.guild_id {
            Some(guild_id) => Self::can_manage(ctx, guild_id, msg).await,
            None => false,
        };

        InboundMessage {
            author: Author {
                id: UserId(msg.author.id.get()),
                name: msg.author.name.clone(),
                bot: msg.author.bot,
                can_manage,
            },
            channel,
            content: msg.content.clone(),
            clean_content: msg.content_safe(&ctx.cache),
        }
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        *self.bot_user.lock().unwrap() = Some(UserId(ready.user.id.get()));
        let _ = self.events.send(RelayEvent::Chat(ChatEvent::Ready {
            guild_count: ready.guilds.len(),
        }));
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let message = Self::inbound(&ctx, &msg).await;
        let _ = self.events.send(RelayEvent::Chat(ChatEvent::Message(message)));
    }
}

pub struct DiscordPlatform {
    token: String,
    events: EventSender,
    http: Arc<Http>,
    bot_user: Arc<Mutex<Option<UserId>>>,
    shard_manager: Mutex<Option<Arc<ShardManager>>>,
}

impl DiscordPlatform {
    pub fn new(token: String, events: EventSender) -> Self {
        let http = Arc::new(Http::new(&token));
        Self {
            token,
            events,
            http,
            bot_user: Arc::new(Mutex::new(None)),
            shard_manager: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn login(&self) -> Result<(), ChatError> {
        let handler = Handler {
            events: self.events.clone(),
            bot_user: self.bot_user.clone(),
        };
        let mut client = Client::builder(&self.token, intents())
            .event_handler(handler)
            .await
            .map_err(request_error)?;
        *self.shard_manager.lock().unwrap() = Some(client.shard_manager.clone());

        info!("Logging in to Discord...");
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match client.start().await {
                Ok(()) => ChatEvent::Disconnected {
                    code: Some(CLOSE_NORMAL),
                    reason: "client shut down".to_string(),
                },
                Err(serenity::Error::Gateway(GatewayError::InvalidAuthentication)) => {
                    ChatEvent::Disconnected {
                        code: Some(CLOSE_AUTHENTICATION_FAILED),
                        reason: "Authentication failed.".to_string(),
                    }
                }
                Err(e) => ChatEvent::Error(e.to_string()),
            };
            let _ = events.send(RelayEvent::Chat(event));
        });
        Ok(())
    }

    async fn shutdown(&self) {
        let manager = self.shard_manager.lock().unwrap().take();
        if let Some(manager) = manager {
            manager.shutdown_all().await;
        }
    }

    fn bot_user(&self) -> Option<UserId> {
        *self.bot_user.lock().unwrap()
    }

    async fn send(&self, channel: ChannelId, message: Outbound) -> Result<(), ChatError> {
        let builder = match message {
            Outbound::Text(text) => CreateMessage::new().content(text),
            Outbound::Rich {
                description,
                colour,
            } => {
                let mut embed = CreateEmbed::new().description(description);
                if let Some(colour) = colour {
                    embed = embed.colour(colour);
                }
                CreateMessage::new().embed(embed)
            }
        };
        serenity::all::ChannelId::new(channel.0)
            .send_message(&*self.http, builder)
            .await
            .map(|_| ())
            .map_err(request_error)
    }

    async fn send_direct(&self, user: UserId, text: &str) -> Result<(), ChatError> {
        serenity::all::UserId::new(user.0)
            .direct_message(&*self.http, CreateMessage::new().content(text))
            .await
            .map(|_| ())
            .map_err(request_error)
    }

    async fn resolve_channel(&self, id: ChannelId) -> Option<ChannelInfo> {
        match serenity::all::ChannelId::new(id.0)
            .to_channel(&*self.http)
            .await
        {
            Ok(channel) => Some(channel_info(&channel)),
            Err(e) => {
                debug!(%id, "Unable to resolve channel: {e}");
                None
            }
        }
    }

    async fn set_presence(&self, presence: Presence) {
        let manager = self.shard_manager.lock().unwrap().clone();
        let Some(manager) = manager else {
            return;
        };
        let status = match presence.availability {
            Availability::Online => OnlineStatus::Online,
            Availability::Idle => OnlineStatus::Idle,
            Availability::DoNotDisturb => OnlineStatus::DoNotDisturb,
        };
        let activity = ActivityData::playing(presence.activity);
        let runners = manager.runners.lock().await;
        for runner in runners.values() {
            runner.runner_tx.set_presence(Some(activity.clone()), status);
        }
    }

    async fn leave_guilds(&self) -> Result<Vec<String>, ChatError> {
        let guilds = self
            .http
            .get_guilds(None, None)
            .await
            .map_err(request_error)?;
        let mut left = Vec::with_capacity(guilds.len());
        for guild in guilds {
            info!("Leaving guild \"{}\"", guild.name);
            self.http
                .leave_guild(guild.id)
                .await
                .map_err(request_error)?;
            left.push(guild.name);
        }
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_content_intent_requested() {
        assert!(intents().contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents().contains(GatewayIntents::DIRECT_MESSAGES));
    }
}
