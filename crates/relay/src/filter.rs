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

use crate::classify::ClassifiedEvent;
use crate::config::RelayConfig;

pub const PRIVATE_MARKER: &str = "*(Private)*";

/// Our own `say` commands echoed back by the server on local connections.
const LOCAL_ECHO_PREFIX: &str = "Server: [";

const JOIN_LEAVE_SUFFIX: &str = "the game";

/// The text to post in the chat channel for an in-game event, or `None` if it is filtered out.
pub fn relay_text(event: &ClassifiedEvent, config: &RelayConfig) -> Option<String> {
    let (text, is_global_message) = match event {
        ClassifiedEvent::Chat { .. } if config.disable_chatmsgs => return None,
        ClassifiedEvent::Chat { private: true, .. } if !config.show_private_chat => return None,
        ClassifiedEvent::Chat {
            body,
            private: true,
            ..
        } => (format!("{PRIVATE_MARKER} {body}"), false),
        ClassifiedEvent::Chat { body, .. } => (body.clone(), false),
        ClassifiedEvent::GlobalMessage { .. } if config.disable_gmsgs => return None,
        ClassifiedEvent::GlobalMessage { body } => (body.clone(), true),
        _ => return None,
    };

    // Player names arrive quoted; drop the quotes around the first one.
    let text = text.replacen('\'', "", 2).replacen('\n', "", 1);

    if text.starts_with(LOCAL_ECHO_PREFIX) {
        return None;
    }
    if is_global_message {
        let join_leave = text.ends_with(JOIN_LEAVE_SUFFIX);
        if (join_leave && config.disable_join_leave_gmsgs)
            || (!join_leave && config.disable_misc_gmsgs)
        {
            return None;
        }
    }
    if !config.hide_prefix && text.contains(": /") {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    const GLOBAL: &str =
        "2024-01-01T00:00:00 123.45 INF Chat (from 'Steam_1', entity id '1', to 'Global'): hello";
    const PRIVATE: &str =
        "2024-01-01T00:00:00 123.45 INF Chat (from 'Steam_1', entity id '1', to 'Party'): psst";

    #[test]
    fn test_global_chat_relayed() {
        let config = RelayConfig::default();
        assert_eq!(
            relay_text(&classify(GLOBAL), &config),
            Some("hello".to_string())
        );

        let config = RelayConfig {
            disable_chatmsgs: true,
            ..Default::default()
        };
        assert_eq!(relay_text(&classify(GLOBAL), &config), None);
    }

    #[test]
    fn test_private_chat() {
        assert_eq!(
            relay_text(&classify(PRIVATE), &RelayConfig::default()),
            None
        );
        let config = RelayConfig {
            show_private_chat: true,
            ..Default::default()
        };
        assert_eq!(
            relay_text(&classify(PRIVATE), &config),
            Some("*(Private)* psst".to_string())
        );
    }

    #[test]
    fn test_speaker_quotes_removed() {
        let line = "2024-01-01T00:00:00 1.0 INF Chat (from 'Steam_1', entity id '1', to 'Global'): 'Bob': it's late";
        assert_eq!(
            relay_text(&classify(line), &RelayConfig::default()),
            Some("Bob: it's late".to_string())
        );
    }

    #[test]
    fn test_global_message_suppression() {
        let joined = classify("2024-01-01T00:00:00 1.0 INF GMSG: Player 'Bob' joined the game");
        let died = classify("2024-01-01T00:00:00 1.0 INF GMSG: Player 'Bob' died");

        let config = RelayConfig::default();
        assert_eq!(
            relay_text(&joined, &config),
            Some("Player Bob joined the game".to_string())
        );
        assert_eq!(relay_text(&died, &config), Some("Player Bob died".to_string()));

        let config = RelayConfig {
            disable_join_leave_gmsgs: true,
            ..Default::default()
        };
        assert_eq!(relay_text(&joined, &config), None);
        assert!(relay_text(&died, &config).is_some());

        let config = RelayConfig {
            disable_misc_gmsgs: true,
            ..Default::default()
        };
        assert!(relay_text(&joined, &config).is_some());
        assert_eq!(relay_text(&died, &config), None);

        let config = RelayConfig {
            disable_gmsgs: true,
            ..Default::default()
        };
        assert_eq!(relay_text(&joined, &config), None);
    }

    #[test]
    fn test_command_lookalikes_and_echo_dropped() {
        let slash = classify(
            "2024-01-01T00:00:00 1.0 INF Chat (from 'Steam_1', entity id '1', to 'Global'): 'Bob': /home",
        );
        assert_eq!(relay_text(&slash, &RelayConfig::default()), None);
        let config = RelayConfig {
            hide_prefix: true,
            ..Default::default()
        };
        assert_eq!(relay_text(&slash, &config), Some("Bob: /home".to_string()));

        let echo = classify(
            "2024-01-01T00:00:00 1.0 INF Chat (from '-non-player-', entity id '-1', to 'Global'): 'Server': [alice] hi",
        );
        assert_eq!(relay_text(&echo, &RelayConfig::default()), None);
    }

    #[test]
    fn test_other_events_not_relayed() {
        assert_eq!(
            relay_text(&classify("Day 3, 10:00"), &RelayConfig::default()),
            None
        );
    }
}
