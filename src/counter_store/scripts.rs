/// Scripts the crate knows how to run atomically against a counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterScript {
    /// KEYS[1] = bucket hash; ARGV = capacity, refill_rate, now, cost, ttl.
    /// Returns `{allowed, tokens, retry_after}` as integers.
    TokenBucket,
}

impl CounterScript {
    pub fn name(&self) -> &'static str {
        match self {
            CounterScript::TokenBucket => "token_bucket",
        }
    }

    pub fn lua(&self) -> &'static str {
        match self {
            CounterScript::TokenBucket => TOKEN_BUCKET_LUA,
        }
    }
}

const TOKEN_BUCKET_LUA: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local data = redis.call("HMGET", key, "tokens", "ts")
local tokens = tonumber(data[1])
local ts = tonumber(data[2])

if tokens == nil then tokens = capacity end
if ts == nil then ts = now end

local elapsed = math.max(0, now - ts)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

local allowed = 0
local retry_after = 0

if tokens >= cost then
  allowed = 1
  tokens = tokens - cost
else
  retry_after = math.ceil((cost - tokens) / refill_rate)
end

redis.call("HSET", key, "tokens", tostring(tokens), "ts", tostring(now))
redis.call("EXPIRE", key, ttl)

return {allowed, math.floor(tokens), retry_after}
"#;

/// Result of one refill-and-take step on a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucketStep {
    pub allowed: bool,
    /// Token balance to persist
    pub tokens: f64,
    pub retry_after: u64,
}

/// The arithmetic of [`CounterScript::TokenBucket`], for backends that execute
/// it in-process. Must stay in lockstep with the Lua source.
pub fn token_bucket_step(
    stored_tokens: Option<f64>,
    stored_ts: Option<f64>,
    capacity: f64,
    refill_rate: f64,
    now: f64,
    cost: f64,
) -> TokenBucketStep {
    let tokens = stored_tokens.unwrap_or(capacity);
    let ts = stored_ts.unwrap_or(now);

    let elapsed = (now - ts).max(0.0);
    let tokens = capacity.min(tokens + elapsed * refill_rate);

    if tokens >= cost {
        TokenBucketStep {
            allowed: true,
            tokens: tokens - cost,
            retry_after: 0,
        }
    } else {
        TokenBucketStep {
            allowed: false,
            tokens,
            retry_after: ((cost - tokens) / refill_rate).ceil() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_bucket_starts_full() {
        let step = token_bucket_step(None, None, 2.0, 2.0 / 60.0, 1000.0, 1.0);
        assert!(step.allowed);
        assert_eq!(step.tokens, 1.0);
    }

    #[test]
    fn denial_leaves_tokens_untouched() {
        let step = token_bucket_step(Some(0.0), Some(1000.0), 2.0, 2.0 / 60.0, 1000.0, 1.0);
        assert!(!step.allowed);
        assert_eq!(step.tokens, 0.0);
        assert_eq!(step.retry_after, 30);
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let step = token_bucket_step(Some(0.0), Some(0.0), 5.0, 1.0, 10_000.0, 1.0);
        assert!(step.allowed);
        assert_eq!(step.tokens, 4.0);
    }

    #[test]
    fn clock_going_backwards_does_not_drain() {
        let step = token_bucket_step(Some(1.5), Some(2000.0), 2.0, 1.0, 1000.0, 1.0);
        assert!(step.allowed);
        assert_eq!(step.tokens, 0.5);
    }

    #[test]
    fn lua_returns_the_same_shape() {
        let lua = CounterScript::TokenBucket.lua();
        assert!(lua.contains("HMGET"));
        assert!(lua.contains("EXPIRE"));
        assert_eq!(CounterScript::TokenBucket.name(), "token_bucket");
    }
}
