//! Task identity encoding.
//!
//! The remote queue has no metadata field, so everything the scheduler needs
//! to recognise its own tasks lives in the task id, the last segment of the
//! task name:
//!
//! ```text
//! <prefix><id>_<hex unix nanos>v<version>
//! ```
//!
//! The part before `v` is the *comparison key*: it names one logical schedule
//! entry regardless of payload revisions. The version suffix makes each
//! revision a distinct remote name, since the queue cannot update a task in
//! place.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::constants::{MAX_TASK_ID_LEN, TASKS_SEGMENT, TIMESTAMP_SEPARATOR, VERSION_SEPARATOR};
use crate::error::ValidationError;

/// Failures decoding a task name back into an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The task id does not start with the owner prefix.
    #[error("task {name} does not carry prefix {prefix:?}")]
    NotOwned {
        /// The task name as listed.
        name: String,
        /// The expected owner prefix.
        prefix: String,
    },

    /// A separator is missing.
    #[error("malformed task name {name}: {reason}")]
    Malformed {
        /// The task name as listed.
        name: String,
        /// Which part could not be found.
        reason: &'static str,
    },

    /// The version suffix is not a non-negative integer.
    #[error("malformed task name {name}: invalid version {version:?}")]
    InvalidVersion {
        /// The task name as listed.
        name: String,
        /// The text after the version separator.
        version: String,
    },
}

/// The parts of a task id the scheduler cannot recover from other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    /// Caller-chosen id, without the owner prefix.
    pub id: String,
    /// Revision number.
    pub version: u64,
}

/// Builds a queue path from its components.
///
/// # Examples
///
/// ```
/// use cloudtask_scheduler::identity::queue_path;
///
/// assert_eq!(
///     queue_path("tokyo-rain-123", "asia-northeast1", "scheduler"),
///     "projects/tokyo-rain-123/locations/asia-northeast1/queues/scheduler"
/// );
/// ```
pub fn queue_path(project_id: &str, location: &str, queue: &str) -> String {
    format!("projects/{project_id}/locations/{location}/queues/{queue}")
}

/// Joins a queue path and a task id into a fully-qualified task name.
pub fn task_name(queue_path: &str, task_id: &str) -> String {
    format!("{queue_path}{TASKS_SEGMENT}{task_id}")
}

/// Identity of a logical task, independent of its version.
///
/// # Examples
///
/// ```
/// use chrono::DateTime;
/// use cloudtask_scheduler::identity::comparison_key;
///
/// let at = DateTime::from_timestamp(1, 2).unwrap();
/// assert_eq!(comparison_key("test_", "id", &at), "test_id_3b9aca02");
/// ```
pub fn comparison_key(prefix: &str, id: &str, scheduled_at: &DateTime<Utc>) -> String {
    format!(
        "{prefix}{id}{TIMESTAMP_SEPARATOR}{}",
        unix_nanos_hex(scheduled_at)
    )
}

/// Encodes the full task id: comparison key plus version.
///
/// # Examples
///
/// ```
/// use chrono::DateTime;
/// use cloudtask_scheduler::identity::encode_task_id;
///
/// let at = DateTime::from_timestamp(1, 234_567_890).unwrap();
/// assert_eq!(encode_task_id("pre-", "id", &at, 1), "pre-id_499602d2v1");
/// ```
pub fn encode_task_id(
    prefix: &str,
    id: &str,
    scheduled_at: &DateTime<Utc>,
    version: u64,
) -> String {
    format!(
        "{}{VERSION_SEPARATOR}{version}",
        comparison_key(prefix, id, scheduled_at)
    )
}

/// Decodes the id and version from a task name.
///
/// Only the last path segment is inspected, so both full names and bare
/// task ids are accepted. The schedule time is not recovered here; the
/// remote task's own schedule time is authoritative.
///
/// Ids may themselves contain `_`: the last `_` is taken as the timestamp
/// separator, which is unambiguous because the hex field never contains one.
///
/// # Errors
///
/// - [`IdentityError::NotOwned`] if the task id lacks `prefix`.
/// - [`IdentityError::Malformed`] if a separator is missing.
/// - [`IdentityError::InvalidVersion`] if the version is not an integer.
///
/// # Examples
///
/// ```
/// use cloudtask_scheduler::identity::decode;
///
/// let identity = decode(
///     "test_",
///     "projects/p/locations/l/queues/q/tasks/test_id_3b9aca02v1",
/// )
/// .unwrap();
/// assert_eq!(identity.id, "id");
/// assert_eq!(identity.version, 1);
/// ```
pub fn decode(prefix: &str, name: &str) -> Result<TaskIdentity, IdentityError> {
    let task_id = name.rsplit('/').next().unwrap_or(name);

    let Some(rest) = task_id.strip_prefix(prefix) else {
        return Err(IdentityError::NotOwned {
            name: name.to_string(),
            prefix: prefix.to_string(),
        });
    };

    let Some((id, stamped)) = rest.rsplit_once(TIMESTAMP_SEPARATOR) else {
        return Err(IdentityError::Malformed {
            name: name.to_string(),
            reason: "no timestamp separator",
        });
    };

    let Some((_, version)) = stamped.rsplit_once(VERSION_SEPARATOR) else {
        return Err(IdentityError::Malformed {
            name: name.to_string(),
            reason: "no version separator",
        });
    };

    let version = version
        .parse::<u64>()
        .map_err(|_| IdentityError::InvalidVersion {
            name: name.to_string(),
            version: version.to_string(),
        })?;

    Ok(TaskIdentity {
        id: id.to_string(),
        version,
    })
}

/// Checks a task id against the remote queue's naming rules.
///
/// Task ids may contain only letters, digits, hyphens and underscores, and
/// are at most [`MAX_TASK_ID_LEN`] characters long.
pub fn validate_task_id(task_id: &str) -> Result<(), ValidationError> {
    let len = task_id.chars().count();
    if len > MAX_TASK_ID_LEN {
        return Err(ValidationError::TooLong {
            task_id: task_id.to_string(),
            len,
            max: MAX_TASK_ID_LEN,
        });
    }

    if let Some(character) = task_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ValidationError::InvalidCharacter {
            task_id: task_id.to_string(),
            character,
        });
    }

    Ok(())
}

// Nanoseconds since the epoch in lowercase hex; negative instants carry a
// leading '-' rather than a two's complement rendering.
fn unix_nanos_hex(at: &DateTime<Utc>) -> String {
    let nanos =
        i128::from(at.timestamp()) * 1_000_000_000 + i128::from(at.timestamp_subsec_nanos());
    if nanos < 0 {
        format!("-{:x}", nanos.unsigned_abs())
    } else {
        format!("{nanos:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, nanos).unwrap()
    }

    #[test]
    fn encodes_reference_identity() {
        assert_eq!(encode_task_id("test_", "id", &at(1, 2), 1), "test_id_3b9aca02v1");
        assert_eq!(encode_task_id("test_", "get", &at(10, 2), 1), "test_get_2540be402v1");
    }

    #[test]
    fn negative_instants_keep_a_sign() {
        assert_eq!(comparison_key("p-", "a", &at(-1, 0)), "p-a_-3b9aca00");
        assert!(validate_task_id(&encode_task_id("p-", "a", &at(-1, 0), 1)).is_ok());
    }

    #[test]
    fn task_name_joins_with_tasks_segment() {
        assert_eq!(
            task_name("projects/p/locations/l/queues/q", "pre-a_1v1"),
            "projects/p/locations/l/queues/q/tasks/pre-a_1v1"
        );
    }

    #[rstest]
    #[case::full_name(
        "projects/tokyo-rain-123/locations/asia-northeast1/queues/scheduler/tasks/pre-id_499602d2v1",
        "id",
        1
    )]
    #[case::bare_task_id("pre-id_499602d2v1", "id", 1)]
    #[case::id_with_underscore("pre-a_b_499602d2v12", "a_b", 12)]
    #[case::id_with_version_letter("pre-vv_499602d2v3", "vv", 3)]
    fn decodes_valid_names(#[case] name: &str, #[case] id: &str, #[case] version: u64) {
        let identity = decode("pre-", name).unwrap();
        assert_eq!(identity.id, id);
        assert_eq!(identity.version, version);
    }

    #[test]
    fn foreign_prefix_is_not_owned() {
        let err = decode(
            "pre-",
            "projects/tokyo-rain-123/locations/asia-northeast1/queues/scheduler/tasks/pre_id_499602d2v1",
        )
        .unwrap_err();
        assert!(matches!(err, IdentityError::NotOwned { .. }));
    }

    #[rstest]
    #[case::no_timestamp_separator("pre-id-499602d2v1")]
    #[case::no_version_separator("pre-id_499602d2_1")]
    fn missing_separators_are_malformed(#[case] name: &str) {
        assert!(matches!(
            decode("pre-", name),
            Err(IdentityError::Malformed { .. })
        ));
    }

    #[rstest]
    #[case::hex_version("pre-id_499602d2vf")]
    #[case::empty_version("pre-id_499602d2v")]
    #[case::negative_version("pre-id_499602d2v-1")]
    fn bad_versions_are_rejected(#[case] name: &str) {
        assert!(matches!(
            decode("pre-", name),
            Err(IdentityError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn task_id_length_boundary() {
        // "pre-" + id + "_499602d2" + "v1" is 15 characters plus the id.
        let accepted = encode_task_id("pre-", &"_".repeat(485), &at(1, 234_567_890), 1);
        assert_eq!(accepted.len(), MAX_TASK_ID_LEN);
        assert_eq!(validate_task_id(&accepted), Ok(()));

        let rejected = encode_task_id("pre-", &"_".repeat(486), &at(1, 234_567_890), 1);
        assert!(matches!(
            validate_task_id(&rejected),
            Err(ValidationError::TooLong { len: 501, .. })
        ));
    }

    #[rstest]
    #[case("a/b", '/')]
    #[case("#ab", '#')]
    #[case("caf\u{e9}", '\u{e9}')]
    #[case("a.b", '.')]
    fn invalid_characters_are_rejected(#[case] id: &str, #[case] bad: char) {
        let task_id = encode_task_id("pre-", id, &at(1, 234_567_890), 1);
        assert!(matches!(
            validate_task_id(&task_id),
            Err(ValidationError::InvalidCharacter { character, .. }) if character == bad
        ));
    }

    #[test]
    fn allowed_alphabet_passes() {
        let task_id = encode_task_id("pre-", "a-b_c0XYZ", &at(1, 234_567_890), 7);
        assert_eq!(validate_task_id(&task_id), Ok(()));
    }
}
