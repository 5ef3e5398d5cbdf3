// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "dlm:deadlock:node:", "dlm:deadlock:node:*" },
    star = { "a*b", "a\\*b*" },
    brackets = { "k[1]", "k\\[1\\]*" },
    question = { "x?", "x\\?*" },
)]
fn glob_escape_quotes_metacharacters(prefix: &str, expected: &str) {
    assert_eq!(glob_escape(prefix), expected);
}

#[test]
fn ms_never_zero() {
    assert_eq!(ms(Duration::ZERO), 1);
    assert_eq!(ms(Duration::from_millis(1500)), 1500);
}

#[test]
fn scripts_embed_server_time_and_reader_checks() {
    assert!(ACQUIRE_READ.contains("redis.call('TIME')"));
    assert!(FAIR_ATTEMPT.contains("local function seq_of"));
    assert!(FAIR_ATTEMPT.contains("ZCARD', KEYS[3]"));
    assert!(ACQUIRE_EXCLUSIVE.contains("ZCARD"));
    assert!(!RELEASE_EXCLUSIVE.contains("TIME"));
}

#[test]
fn holder_reply_maps_nil_to_denied() {
    assert_eq!(holder_reply(None), ScriptReply::Denied);
    assert_eq!(
        holder_reply(Some("tok".into())),
        ScriptReply::Granted("tok".into())
    );
}
