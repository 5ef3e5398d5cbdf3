// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis coordination store
//!
//! Each [`AtomicScript`] maps to a Lua script, which Redis runs without
//! interleaving other commands. Deadlines stored inside values (reader
//! leases, queue entries) use the server clock via `TIME`, so processes on
//! different hosts agree on expiry.

use super::{AtomicScript, CoordinationStore, ScriptReply, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;

/// Server time in milliseconds as `now`
macro_rules! lua_now {
    () => {
        "local t = redis.call('TIME')\n\
         local now = tonumber(t[1]) * 1000 + math.floor(tonumber(t[2]) / 1000)\n"
    };
}

/// Split a queue entry into its sequence string and deadline
macro_rules! lua_seq_of {
    () => {
        "local function seq_of(entry)\n\
           local sep = string.find(entry, '|', 1, true)\n\
           if not sep then return nil, 0 end\n\
           return string.sub(entry, 1, sep - 1), tonumber(string.sub(entry, sep + 1))\n\
         end\n"
    };
}

// KEYS[1]=holder KEYS[2]=readers; ARGV[1]=token ARGV[2]=owner_prefix ARGV[3]=ttl_ms
const ACQUIRE_EXCLUSIVE: &str = concat!(
    lua_now!(),
    "
local holder = redis.call('GET', KEYS[1])
if holder then
  if string.sub(holder, 1, string.len(ARGV[2])) == ARGV[2] then
    redis.call('PEXPIRE', KEYS[1], ARGV[3])
    return holder
  end
  return false
end
redis.call('ZREMRANGEBYSCORE', KEYS[2], '-inf', now)
if redis.call('ZCARD', KEYS[2]) > 0 then
  return false
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[3])
return ARGV[1]
"
);

// KEYS[1]=lock; ARGV[1]=token
const RELEASE_EXCLUSIVE: &str = "
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
";

// KEYS[1]=holder KEYS[2]=readers; ARGV[1]=token ARGV[2]=ttl_ms
const ACQUIRE_READ: &str = concat!(
    lua_now!(),
    "
if redis.call('EXISTS', KEYS[1]) == 1 then
  return false
end
redis.call('ZREMRANGEBYSCORE', KEYS[2], '-inf', now)
redis.call('ZADD', KEYS[2], now + tonumber(ARGV[2]), ARGV[1])
if redis.call('PTTL', KEYS[2]) < tonumber(ARGV[2]) then
  redis.call('PEXPIRE', KEYS[2], ARGV[2])
end
return ARGV[1]
"
);

// KEYS[1]=readers; ARGV[1]=token
const RELEASE_READ: &str = concat!(
    lua_now!(),
    "
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now)
return redis.call('ZREM', KEYS[1], ARGV[1])
"
);

// KEYS[1]=sequence KEYS[2]=queue; ARGV[1]=entry_ttl_ms ARGV[2]=keep_alive_ms
const ENQUEUE: &str = concat!(
    lua_now!(),
    "
local seq = redis.call('INCR', KEYS[1])
redis.call('PEXPIRE', KEYS[1], ARGV[2])
redis.call('RPUSH', KEYS[2], string.format('%d|%d', seq, now + tonumber(ARGV[1])))
if redis.call('PTTL', KEYS[2]) < tonumber(ARGV[2]) then
  redis.call('PEXPIRE', KEYS[2], ARGV[2])
end
return seq
"
);

// KEYS[1]=holder KEYS[2]=queue KEYS[3]=readers; ARGV[1]=token ARGV[2]=owner_prefix ARGV[3]=sequence ARGV[4]=ttl_ms
const FAIR_ATTEMPT: &str = concat!(
    lua_now!(),
    lua_seq_of!(),
    "
while true do
  local head = redis.call('LINDEX', KEYS[2], 0)
  if not head then break end
  local _, deadline = seq_of(head)
  if deadline and deadline > now then break end
  redis.call('LPOP', KEYS[2])
end
local holder = redis.call('GET', KEYS[1])
if holder then
  if string.sub(holder, 1, string.len(ARGV[2])) == ARGV[2] then
    redis.call('PEXPIRE', KEYS[1], ARGV[4])
    for _, entry in ipairs(redis.call('LRANGE', KEYS[2], 0, -1)) do
      if seq_of(entry) == ARGV[3] then
        redis.call('LREM', KEYS[2], 1, entry)
      end
    end
    return holder
  end
  return false
end
redis.call('ZREMRANGEBYSCORE', KEYS[3], '-inf', now)
if redis.call('ZCARD', KEYS[3]) > 0 then
  return false
end
local head = redis.call('LINDEX', KEYS[2], 0)
if head and seq_of(head) == ARGV[3] then
  redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[4])
  redis.call('LPOP', KEYS[2])
  return ARGV[1]
end
return false
"
);

// KEYS[1]=queue; ARGV[1]=sequence
const DEQUEUE: &str = concat!(
    lua_seq_of!(),
    "
for _, entry in ipairs(redis.call('LRANGE', KEYS[1], 0, -1)) do
  if seq_of(entry) == ARGV[1] then
    return redis.call('LREM', KEYS[1], 1, entry)
  end
end
return 0
"
);

struct Scripts {
    acquire_exclusive: Script,
    release_exclusive: Script,
    acquire_read: Script,
    release_read: Script,
    enqueue: Script,
    fair_attempt: Script,
    dequeue: Script,
}

impl Scripts {
    fn load() -> Self {
        Self {
            acquire_exclusive: Script::new(ACQUIRE_EXCLUSIVE),
            release_exclusive: Script::new(RELEASE_EXCLUSIVE),
            acquire_read: Script::new(ACQUIRE_READ),
            release_read: Script::new(RELEASE_READ),
            enqueue: Script::new(ENQUEUE),
            fair_attempt: Script::new(FAIR_ATTEMPT),
            dequeue: Script::new(DEQUEUE),
        }
    }
}

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        StoreError::Unavailable(format!("redis: {}", e))
    }
}

fn ms(duration: Duration) -> u64 {
    // PX rejects zero
    (duration.as_millis() as u64).max(1)
}

fn holder_reply(holder: Option<String>) -> ScriptReply {
    match holder {
        Some(token) => ScriptReply::Granted(token),
        None => ScriptReply::Denied,
    }
}

/// Escape glob metacharacters for `SCAN MATCH`
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

/// Coordination store backed by a Redis server
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    scripts: Arc<Scripts>,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://localhost:6379`)
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!(url, "connected to redis");
        Ok(Self {
            manager,
            scripts: Arc::new(Scripts::load()),
        })
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        let mut conn = self.manager.clone();
        let s = &self.scripts;
        let reply = match script {
            AtomicScript::AcquireExclusive {
                key,
                readers_key,
                token,
                owner_prefix,
                ttl,
            } => {
                let holder: Option<String> = s
                    .acquire_exclusive
                    .key(key)
                    .key(readers_key)
                    .arg(token)
                    .arg(owner_prefix)
                    .arg(ms(*ttl))
                    .invoke_async(&mut conn)
                    .await?;
                holder_reply(holder)
            }
            AtomicScript::ReleaseExclusive { key, token } => {
                let deleted: i64 = s
                    .release_exclusive
                    .key(key)
                    .arg(token)
                    .invoke_async(&mut conn)
                    .await?;
                ScriptReply::Flag(deleted == 1)
            }
            AtomicScript::AcquireRead {
                holder_key,
                readers_key,
                token,
                ttl,
            } => {
                let holder: Option<String> = s
                    .acquire_read
                    .key(holder_key)
                    .key(readers_key)
                    .arg(token)
                    .arg(ms(*ttl))
                    .invoke_async(&mut conn)
                    .await?;
                holder_reply(holder)
            }
            AtomicScript::ReleaseRead { readers_key, token } => {
                let removed: i64 = s
                    .release_read
                    .key(readers_key)
                    .arg(token)
                    .invoke_async(&mut conn)
                    .await?;
                ScriptReply::Flag(removed == 1)
            }
            AtomicScript::Enqueue {
                sequence_key,
                queue_key,
                entry_ttl,
                queue_ttl,
            } => {
                let sequence: u64 = s
                    .enqueue
                    .key(sequence_key)
                    .key(queue_key)
                    .arg(ms(*entry_ttl))
                    .arg(ms((*queue_ttl).max(*entry_ttl)))
                    .invoke_async(&mut conn)
                    .await?;
                ScriptReply::Count(sequence)
            }
            AtomicScript::FairAttempt {
                holder_key,
                readers_key,
                queue_key,
                token,
                owner_prefix,
                sequence,
                ttl,
            } => {
                let holder: Option<String> = s
                    .fair_attempt
                    .key(holder_key)
                    .key(queue_key)
                    .key(readers_key)
                    .arg(token)
                    .arg(owner_prefix)
                    .arg(sequence.to_string())
                    .arg(ms(*ttl))
                    .invoke_async(&mut conn)
                    .await?;
                holder_reply(holder)
            }
            AtomicScript::Dequeue {
                queue_key,
                sequence,
            } => {
                let removed: i64 = s
                    .dequeue
                    .key(queue_key)
                    .arg(sequence.to_string())
                    .invoke_async(&mut conn)
                    .await?;
                ScriptReply::Flag(removed == 1)
            }
        };
        Ok(reply)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ms(ttl));
        }
        cmd.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.manager.clone();
        // -2 missing, -1 no expiry
        let remaining: i64 = conn.pttl(key).await?;
        Ok((remaining >= 0).then(|| Duration::from_millis(remaining as u64)))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.rpush(key, value).await?)
    }

    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.lindex(key, 0).await?)
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.lpop(key, None).await?)
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
