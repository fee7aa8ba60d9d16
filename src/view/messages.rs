/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Wire shapes of view descriptions and prepare payloads.
//!
//! The `members` and `primary` fields of a view description each accept several shapes. They are
//! decoded here, once, into explicit variants, and then normalized into canonical
//! [`Member`](super::types::Member)s. Nothing outside this module looks at the raw shapes.
//!
//! ## View description
//!
//! ```text
//! {
//!     "group_name": "G",                  // optional string
//!     "viewno": 3,                        // non-negative integer
//!     "primary": 1,                       // index, or uid string when "members" is a list
//!     "members": ["A", {"uid": "B", "addr": "10.0.0.2:7000"}, "C"]
//! }
//! ```
//!
//! `members` may instead be a uid-keyed object: `{"A": true, "B": {"addr": "10.0.0.2:7000"}}`. In
//! that form members are ordered by uid.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::Member;

/// The top-level fields of a view description.
#[derive(Deserialize)]
pub(crate) struct ViewWire {
    #[serde(default)]
    pub(crate) group_name: Option<String>,
    #[serde(default)]
    pub(crate) members: Option<MembersWire>,
    #[serde(default)]
    pub(crate) viewno: Option<u64>,
    #[serde(default)]
    pub(crate) primary: Option<PrimaryWire>,
}

/// The two accepted shapes of the `members` field.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum MembersWire {
    /// Members in primary-rotation order.
    List(Vec<MemberWire>),

    /// Members keyed by uid.
    Map(BTreeMap<String, MemberWire>),
}

/// The accepted shapes of a single member entry.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum MemberWire {
    /// A bare uid.
    Uid(String),

    /// A presence flag. Only meaningful in the uid-keyed form, where the key is the uid.
    Present(bool),

    /// A peer name object.
    PeerName(Map<String, Value>),
}

/// The two accepted shapes of the `primary` field.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum PrimaryWire {
    Index(u64),
    Uid(String),
}

impl MembersWire {
    pub(crate) fn is_map(&self) -> bool {
        matches!(self, MembersWire::Map(_))
    }

    /// Normalize every entry into a [`Member`], in membership order.
    ///
    /// Uniqueness of uids is checked by the caller, which scans the result anyway.
    pub(crate) fn into_members(self) -> Result<Vec<Member>, ViewParseError> {
        let mut members = Vec::new();
        match self {
            MembersWire::List(entries) => {
                for (position, entry) in entries.into_iter().enumerate() {
                    let member = match entry {
                        MemberWire::Uid(uid) => {
                            check_uid(&uid)?;
                            Member::new(uid, None)
                        }
                        MemberWire::Present(_) => {
                            return Err(ViewParseError::MissingUid { position })
                        }
                        MemberWire::PeerName(peer_name) => {
                            let uid = match peer_name.get("uid") {
                                Some(Value::String(uid)) => uid.clone(),
                                _ => return Err(ViewParseError::MissingUid { position }),
                            };
                            check_uid(&uid)?;
                            Member::new(uid, Some(peer_name))
                        }
                    };
                    members.push(member);
                }
            }
            MembersWire::Map(entries) => {
                for (key, entry) in entries {
                    check_uid(&key)?;
                    let member = match entry {
                        MemberWire::Uid(uid) if uid == key => Member::new(key, None),
                        MemberWire::Uid(uid) => {
                            return Err(ViewParseError::UidMismatch { key, uid })
                        }
                        MemberWire::Present(true) => Member::new(key, None),
                        MemberWire::Present(false) => continue,
                        MemberWire::PeerName(peer_name) => {
                            // A non-string uid never matches, even if it prints like the key.
                            let mismatch = match peer_name.get("uid") {
                                None => None,
                                Some(Value::String(uid)) if *uid == key => None,
                                Some(Value::String(uid)) => Some(uid.clone()),
                                Some(other) => Some(other.to_string()),
                            };
                            match mismatch {
                                Some(uid) => {
                                    return Err(ViewParseError::UidMismatch { key, uid })
                                }
                                None => Member::new(key, Some(peer_name)),
                            }
                        }
                    };
                    members.push(member);
                }
            }
        }
        Ok(members)
    }
}

fn check_uid(uid: &str) -> Result<(), ViewParseError> {
    if uid.is_empty() {
        Err(ViewParseError::EmptyUid)
    } else {
        Ok(())
    }
}

/// Payload of a member's response to a prepare (view-change) round.
///
/// ```text
/// { "confirm": true, "ackno": 17 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparePayload {
    #[serde(default)]
    pub confirm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ackno: Option<u64>,
}

impl PreparePayload {
    pub fn new(confirm: bool, ackno: Option<u64>) -> Self {
        Self { confirm, ackno }
    }
}

impl TryFrom<&Value> for PreparePayload {
    type Error = ViewParseError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        if !value.is_object() {
            return Err(ViewParseError::NotAnObject);
        }
        PreparePayload::deserialize(value).map_err(|err| ViewParseError::Malformed(err.to_string()))
    }
}

impl From<&PreparePayload> for Value {
    fn from(payload: &PreparePayload) -> Self {
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }
}

/// Enumerates the reasons a view description can be rejected.
///
/// A rejected description never changes the view that was being parsed into beyond clearing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewParseError {
    /// The message is not a JSON object.
    NotAnObject,

    /// A field has the wrong type or shape.
    Malformed(String),

    /// The `members` field is missing.
    MissingMembers,

    /// The `viewno` field is missing, and a view number was required.
    MissingViewNumber,

    /// The `primary` field is missing, and a primary was required.
    MissingPrimary,

    /// A member entry in list form carries no string uid.
    MissingUid { position: usize },

    /// A member uid is the empty string.
    EmptyUid,

    /// Two member entries share a uid.
    DuplicateUid { uid: String },

    /// In uid-keyed form, a member's `uid` disagrees with its key.
    UidMismatch { key: String, uid: String },

    /// The primary was named by uid, but members were given in uid-keyed form.
    PrimaryUidWithMembersMap,

    /// The primary was named by a uid that is not a member.
    UnknownPrimary { uid: String },

    /// The primary index does not refer to a member.
    PrimaryOutOfRange { index: u64, size: usize },
}

impl Display for ViewParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ViewParseError::NotAnObject => write!(f, "view message is not an object"),
            ViewParseError::Malformed(reason) => write!(f, "malformed view message: {}", reason),
            ViewParseError::MissingMembers => write!(f, "view message has no members"),
            ViewParseError::MissingViewNumber => write!(f, "view message has no viewno"),
            ViewParseError::MissingPrimary => write!(f, "view message has no primary"),
            ViewParseError::MissingUid { position } => {
                write!(f, "member at position {} has no uid", position)
            }
            ViewParseError::EmptyUid => write!(f, "member uid is empty"),
            ViewParseError::DuplicateUid { uid } => write!(f, "member uid {} is repeated", uid),
            ViewParseError::UidMismatch { key, uid } => {
                write!(f, "member keyed {} names uid {}", key, uid)
            }
            ViewParseError::PrimaryUidWithMembersMap => {
                write!(f, "primary named by uid requires members in list form")
            }
            ViewParseError::UnknownPrimary { uid } => write!(f, "primary {} is not a member", uid),
            ViewParseError::PrimaryOutOfRange { index, size } => {
                write!(f, "primary index {} out of range for {} members", index, size)
            }
        }
    }
}

impl std::error::Error for ViewParseError {}
