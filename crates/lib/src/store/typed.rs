//! Typed views over node payloads.
//!
//! Values are stored as their UTF-8 text form, so `42` is the two bytes `"42"`
//! and `true` is `"true"`. Booleans decode leniently: `"true"` in any case is
//! true and everything else is false.

use std::str::FromStr;

use super::{NodeStore, StoreError};
use crate::Result;

impl NodeStore {
    pub async fn get_string(&self, path: &str) -> Result<String> {
        let data = self.get(path).await?;
        String::from_utf8(data).map_err(|_| decode_error(path, "string"))
    }

    pub async fn get_i32(&self, path: &str) -> Result<i32> {
        self.get_parsed(path, "i32").await
    }

    pub async fn get_i64(&self, path: &str) -> Result<i64> {
        self.get_parsed(path, "i64").await
    }

    pub async fn get_bool(&self, path: &str) -> Result<bool> {
        Ok(parse_bool(&self.get(path).await?))
    }

    pub async fn set_string(&self, path: &str, value: &str) -> Result<()> {
        self.set_data(path, value.as_bytes()).await
    }

    pub async fn set_i32(&self, path: &str, value: i32) -> Result<()> {
        self.set_data(path, value.to_string().as_bytes()).await
    }

    pub async fn set_i64(&self, path: &str, value: i64) -> Result<()> {
        self.set_data(path, value.to_string().as_bytes()).await
    }

    pub async fn set_bool(&self, path: &str, value: bool) -> Result<()> {
        self.set_data(path, value.to_string().as_bytes()).await
    }

    /// Creates a node holding `value`; see [`NodeStore::create`].
    pub async fn create_string(
        &self,
        path: &str,
        value: &str,
        ephemeral: bool,
        create_parents: bool,
    ) -> Result<()> {
        self.create(path, value.as_bytes(), ephemeral, create_parents).await
    }

    pub async fn create_i32(
        &self,
        path: &str,
        value: i32,
        ephemeral: bool,
        create_parents: bool,
    ) -> Result<()> {
        self.create_string(path, &value.to_string(), ephemeral, create_parents).await
    }

    pub async fn create_i64(
        &self,
        path: &str,
        value: i64,
        ephemeral: bool,
        create_parents: bool,
    ) -> Result<()> {
        self.create_string(path, &value.to_string(), ephemeral, create_parents).await
    }

    pub async fn create_bool(
        &self,
        path: &str,
        value: bool,
        ephemeral: bool,
        create_parents: bool,
    ) -> Result<()> {
        self.create_string(path, &value.to_string(), ephemeral, create_parents).await
    }

    async fn get_parsed<T: FromStr>(&self, path: &str, expected: &'static str) -> Result<T> {
        let data = self.get(path).await?;
        std::str::from_utf8(&data)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| decode_error(path, expected))
    }
}

fn parse_bool(data: &[u8]) -> bool {
    std::str::from_utf8(data).is_ok_and(|text| text.trim().eq_ignore_ascii_case("true"))
}

fn decode_error(path: &str, expected: &'static str) -> crate::Error {
    StoreError::Decode {
        path: path.to_string(),
        expected,
    }
    .into()
}
