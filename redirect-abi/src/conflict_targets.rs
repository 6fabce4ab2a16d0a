//   Copyright (c) 2024-2026 Anton Kundenko <singaraiona@gmail.com>
//   All rights reserved.
//
//   Permission is hereby granted, free of charge, to any person obtaining a copy
//   of this software and associated documentation files (the "Software"), to deal
//   in the Software without restriction, including without limitation the rights
//   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
//   copies of the Software, and to permit persons to whom the Software is
//   furnished to do so, subject to the following conditions:
//
//   The above copyright notice and this permission notice shall be included in all
//   copies or substantial portions of the Software.
//
//   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
//   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
//   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
//   SOFTWARE.

//! Static conflict-target table for the whitelisted Plex library schema
//! (§4.2 item 6). `Statement::prepare` has no way to recover a table's
//! primary key from the statement text alone, so the ABI entry point
//! supplies this fixed table instead of an empty one — without it, stage 6
//! never fires against a real host and every `INSERT OR REPLACE` is
//! rejected by the remote server's foreign dialect.
//!
//! Every table named here carries a surrogate `id` primary key, which is
//! the universal shape of Plex's `com.plexapp.plugins.library.db` schema;
//! none of them needs a composite or non-`id` conflict target.

use redirect_core::translate::{ConflictTarget, StaticConflictTargets};

const ID_KEYED_TABLES: &[&str] = &[
    "metadata_items",
    "media_items",
    "media_parts",
    "media_streams",
    "tags",
    "taggings",
    "accounts",
    "devices",
    "library_sections",
    "section_locations",
    "directories",
    "metadata_item_settings",
];

/// Builds the conflict-target lookup handed to every `Statement::prepare`
/// call. Cheap enough to build per-call; callers needing to avoid the
/// reallocation can hold onto the returned value across calls instead.
pub fn plex_conflict_targets() -> StaticConflictTargets {
    let entries = ID_KEYED_TABLES
        .iter()
        .map(|&table| {
            (
                table.to_string(),
                ConflictTarget {
                    columns: vec!["id".to_string()],
                    has_id_column: true,
                },
            )
        })
        .collect();
    StaticConflictTargets(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redirect_core::translate::ConflictTargetLookup;

    #[test]
    fn known_table_resolves_to_id_conflict_target() {
        let targets = plex_conflict_targets();
        let target = targets.lookup("tags").expect("tags should be a known conflict target");
        assert_eq!(target.columns, vec!["id".to_string()]);
        assert!(target.has_id_column);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let targets = plex_conflict_targets();
        assert!(targets.lookup("METADATA_ITEMS").is_some());
    }

    #[test]
    fn unknown_table_falls_back_to_none() {
        let targets = plex_conflict_targets();
        assert!(targets.lookup("not_a_real_table").is_none());
    }
}
