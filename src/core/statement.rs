//! Rule statements (actions)
//!
//! Statements run in order once every expression of a rule matched. The
//! variant set is closed; field combinations the wire schema forbids are
//! rejected by [`Statement::validate`], which both the decoder and the encoder
//! call.

use crate::core::catalog::{ByteUnit, LogLevel, NatFlag, RejectReason, RejectType, TimeUnit, catalog};
use crate::core::error::InvariantViolation;

/// Terminal and control-flow statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop,
    Queue,
    Continue,
    Return,
    Jump(String),
    Goto(String),
}

impl Verdict {
    /// Wire key and rule-language keyword
    pub const fn keyword(&self) -> &'static str {
        match self {
            Verdict::Accept => "accept",
            Verdict::Drop => "drop",
            Verdict::Queue => "queue",
            Verdict::Continue => "continue",
            Verdict::Return => "return",
            Verdict::Jump(_) => "jump",
            Verdict::Goto(_) => "goto",
        }
    }

    /// Target chain of `jump`/`goto`
    pub fn target(&self) -> Option<&str> {
        match self {
            Verdict::Jump(target) | Verdict::Goto(target) => Some(target),
            _ => None,
        }
    }
}

catalog! {
    NatKind, "nat" {
        Snat => "snat",
        Dnat => "dnat",
        Redirect => "redirect",
        Masquerade => "masquerade",
    }
}

/// Address/port translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nat {
    pub kind: NatKind,
    pub addr: Option<String>,
    pub port: Option<u16>,
    pub flags: Vec<NatFlag>,
}

impl Nat {
    fn of(kind: NatKind) -> Self {
        Self {
            kind,
            addr: None,
            port: None,
            flags: Vec::new(),
        }
    }

    pub fn snat(addr: impl Into<String>) -> Self {
        Self {
            addr: Some(addr.into()),
            ..Self::of(NatKind::Snat)
        }
    }

    pub fn dnat(addr: impl Into<String>) -> Self {
        Self {
            addr: Some(addr.into()),
            ..Self::of(NatKind::Dnat)
        }
    }

    pub fn redirect(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Self::of(NatKind::Redirect)
        }
    }

    pub fn masquerade() -> Self {
        Self::of(NatKind::Masquerade)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_flag(mut self, flag: NatFlag) -> Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let violation = |reason| InvariantViolation {
            subject: "nat statement",
            reason,
        };
        match self.kind {
            NatKind::Snat | NatKind::Dnat if self.addr.is_none() => {
                Err(violation("snat/dnat require an address"))
            }
            NatKind::Redirect if self.port.is_none() => Err(violation("redirect requires a port")),
            NatKind::Redirect | NatKind::Masquerade if self.addr.is_some() => {
                Err(violation("redirect/masquerade cannot carry an address"))
            }
            _ => Ok(()),
        }
    }
}

/// Rate limit. `rate_unit` turns a packet rate into a byte rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub rate: u64,
    pub per: TimeUnit,
    pub rate_unit: Option<ByteUnit>,
    pub inv: bool,
    pub burst: Option<u32>,
    pub burst_unit: Option<ByteUnit>,
}

impl Limit {
    /// Packet rate limit, `limit rate <rate>/<per>`
    pub fn packets(rate: u64, per: TimeUnit) -> Self {
        Self {
            rate,
            per,
            rate_unit: None,
            inv: false,
            burst: None,
            burst_unit: None,
        }
    }

    /// Byte rate limit, `limit rate <rate> <unit>/<per>`
    pub fn bytes(rate: u64, unit: ByteUnit, per: TimeUnit) -> Self {
        Self {
            rate_unit: Some(unit),
            ..Self::packets(rate, per)
        }
    }

    /// Matches only traffic above the rate (`limit rate over ...`)
    pub fn over(mut self) -> Self {
        self.inv = true;
        self
    }

    pub fn with_burst(mut self, burst: u32, unit: Option<ByteUnit>) -> Self {
        self.burst = Some(burst);
        self.burst_unit = unit;
        self
    }

    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let violation = |reason| InvariantViolation {
            subject: "limit statement",
            reason,
        };
        if self.burst_unit.is_some() && self.burst.is_none() {
            return Err(violation("burst unit given without a burst"));
        }
        if self.burst_unit.is_some() && self.rate_unit.is_none() {
            return Err(violation("byte burst on a packet rate"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    pub prefix: Option<String>,
    pub level: Option<LogLevel>,
}

/// Packet/byte counter. Values are only present when read back from a live
/// ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    pub packets: Option<u64>,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reject {
    pub reject_type: Option<RejectType>,
    pub reason: Option<RejectReason>,
}

impl Reject {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let violation = |reason| InvariantViolation {
            subject: "reject statement",
            reason,
        };
        match (self.reject_type, self.reason) {
            (None, Some(_)) => Err(violation("reason given without a reject type")),
            (Some(RejectType::TcpReset), Some(_)) => {
                Err(violation("tcp reset does not take a reason"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Verdict(Verdict),
    Nat(Nat),
    Limit(Limit),
    Log(Log),
    Counter(Counter),
    Reject(Reject),
}

impl Statement {
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        match self {
            Statement::Nat(nat) => nat.validate(),
            Statement::Limit(limit) => limit.validate(),
            Statement::Reject(reject) => reject.validate(),
            Statement::Verdict(_) | Statement::Log(_) | Statement::Counter(_) => Ok(()),
        }
    }
}

impl From<Verdict> for Statement {
    fn from(v: Verdict) -> Self {
        Statement::Verdict(v)
    }
}

impl From<Nat> for Statement {
    fn from(n: Nat) -> Self {
        Statement::Nat(n)
    }
}

impl From<Limit> for Statement {
    fn from(l: Limit) -> Self {
        Statement::Limit(l)
    }
}

impl From<Log> for Statement {
    fn from(l: Log) -> Self {
        Statement::Log(l)
    }
}

impl From<Counter> for Statement {
    fn from(c: Counter) -> Self {
        Statement::Counter(c)
    }
}

impl From<Reject> for Statement {
    fn from(r: Reject) -> Self {
        Statement::Reject(r)
    }
}
