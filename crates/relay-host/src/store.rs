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

use std::path::PathBuf;

use async_trait::async_trait;
use horde_relay::{ChannelId, ConfigStore, PersistError};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

/// Keeps the bound channel in the JSON config file the relay was started with.
///
/// Only the `channel` key is replaced; every other key keeps its value.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<Map<String, Value>, PersistError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str(&text).map_err(|e| PersistError(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(PersistError(e.to_string())),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn persist_channel(&self, channel: ChannelId) -> Result<(), PersistError> {
        let mut config = self.read().await?;
        config.insert("channel".to_string(), Value::String(channel.to_string()));

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
        config
            .serialize(&mut serializer)
            .map_err(|e| PersistError(e.to_string()))?;

        tokio::fs::write(&self.path, out)
            .await
            .map_err(|e| PersistError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_written_and_other_keys_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"password": "hunter2", "channel": "channelid"}"#)
            .await
            .unwrap();

        let store = JsonConfigStore::new(&path);
        store.persist_channel(ChannelId(1234)).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("\t\"channel\": \"1234\""));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["password"], "hunter2");
        assert_eq!(value["channel"], "1234");
    }

    #[tokio::test]
    async fn test_unreadable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = JsonConfigStore::new(&path);
        assert!(store.persist_channel(ChannelId(1)).await.is_err());
    }
}
