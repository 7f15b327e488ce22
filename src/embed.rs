// SPDX-License-Identifier: PMPL-1.0-or-later
//! Roster embed rendering and patching
//!
//! Pure functions only: no I/O, no clock. A roster embed is a description
//! followed by one field per tracked role, each value a newline-separated
//! list of member mentions (oldest first).

use crate::gateway::{Embed, EmbedField, UserId};

/// Platform limit on fields per embed
pub const MAX_EMBED_FIELDS: usize = 25;

/// Platform limit on a single field value, in bytes
pub const MAX_FIELD_VALUE_LEN: usize = 1024;

/// Platform limit on the embed description, in bytes
pub const MAX_DESCRIPTION_LEN: usize = 4096;

/// Field label for a role name.
pub fn role_label(name: &str) -> String {
    format!("**{}**", name)
}

/// Build a roster embed: one field per (label, members) pair.
///
/// An empty member list renders as an empty value, not an omitted field;
/// the field count must stay 1:1 with the tracked roles.
pub fn build_roster_embed(description: &str, roles: &[(String, Vec<UserId>)]) -> Embed {
    let mut description = description.to_string();
    truncate_at_char_boundary(&mut description, MAX_DESCRIPTION_LEN);

    let fields = roles
        .iter()
        .map(|(label, members)| EmbedField {
            name: label.clone(),
            value: join_members(members),
            inline: false,
        })
        .collect();

    Embed {
        description,
        fields,
    }
}

fn join_members(members: &[UserId]) -> String {
    members
        .iter()
        .map(UserId::mention)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Return a copy of `embed` with the member list of the field matching
/// `label` transformed by `mutate`. All other fields are carried over
/// byte-identical. A label with no matching field leaves the embed
/// unchanged; missing fields are never created here.
pub fn patch_field<F>(embed: &Embed, label: &str, mutate: F) -> Embed
where
    F: FnOnce(Vec<String>) -> Vec<String>,
{
    let mut patched = embed.clone();
    let mut mutate = Some(mutate);

    for field in &mut patched.fields {
        if field.name == label {
            if let Some(mutate) = mutate.take() {
                let members = split_members(&field.value);
                field.value = mutate(members).join("\n");
            }
        }
    }

    patched
}

/// Append `member`'s mention to the field matching `label`.
///
/// The append is unconditional: a duplicate notification for a role the
/// member already holds appends a second mention, matching the source
/// system's behavior.
pub fn add_member(embed: &Embed, label: &str, member: UserId) -> Embed {
    let mention = member.mention();
    patch_field(embed, label, move |mut members| {
        members.push(mention);
        members
    })
}

/// Remove every occurrence of `member`'s mention from the field matching
/// `label`.
pub fn remove_member(embed: &Embed, label: &str, member: UserId) -> Embed {
    let mention = member.mention();
    patch_field(embed, label, move |members| {
        members.into_iter().filter(|m| *m != mention).collect()
    })
}

/// Return a copy of `embed` with a new description, fields untouched.
pub fn with_description(embed: &Embed, description: &str) -> Embed {
    let mut patched = embed.clone();
    patched.description = description.to_string();
    truncate_at_char_boundary(&mut patched.description, MAX_DESCRIPTION_LEN);
    patched
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

fn split_members(value: &str) -> Vec<String> {
    value
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
