//! Field overlay with denormalized companions
//!
//! Relation fields travel with display data the server populated next to them. Overlaying a
//! relation without its companions would show a local id beside a stale server summary.
//!
//! | Dirty field | Also copied |
//! |---|---|
//! | `profileId` | profile summary, `resumeId`, resume summary |
//! | `resumeId` | resume summary |
//! | `bidderId` | bidder summary |

use appdesk_row::{ApplicationRecord, ApplicationRow, CheckStatus, DirtyFields, FieldKey};

/// Copy `key` and its companions from `local` onto `target`
pub fn overlay_field(target: &mut ApplicationRecord, local: &ApplicationRecord, key: FieldKey) {
    target.copy_field_from(local, key);
    match key {
        FieldKey::ProfileId => {
            target.profile.clone_from(&local.profile);
            target.resume_id.clone_from(&local.resume_id);
            target.resume.clone_from(&local.resume);
        }
        FieldKey::ResumeId => target.resume.clone_from(&local.resume),
        FieldKey::BidderId => target.bidder.clone_from(&local.bidder),
        _ => {}
    }
}

/// Start from `fetched` and re-apply every dirty field of `local`
///
/// The result keeps `local`'s dirty set and `fetched`'s origin, so a later save diffs against
/// the newest server state. Staged review values only live while the server still reports
/// the row in review; once it has left `in_review` they are discarded.
#[must_use]
pub fn overlay_row(mut fetched: ApplicationRow, local: &ApplicationRow) -> ApplicationRow {
    let review_open = fetched.record.check_status == CheckStatus::InReview;
    let dirty: DirtyFields = local
        .dirty
        .iter()
        .filter(|key| review_open || !key.is_review())
        .collect();
    for key in dirty.iter() {
        overlay_field(&mut fetched.record, &local.record, key);
    }
    fetched.dirty = dirty;
    fetched
}
