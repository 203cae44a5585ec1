//! Per-field write policy.
//!
//! ## Overview
//!
//! Each write unit owns an ordered table of [`Rule`]s. A field is written when
//! any rule holds; the index of the first rule that holds is recorded in the
//! [`SyncResult`](crate::SyncResult) as the reason for the write.
//!
//! Most tables follow the same two rules:
//!
//! | Index | Rule | Holds when |
//! |-------|------|------------|
//! | 0 | `fill_missing` | source lacks the value and target has it |
//! | 1 | `replace` | replace was requested and the values differ |
//!
//! `bpm` adds an `implausible_source` rule between the two, `uri` has a
//! single `changed` rule and `images` fills from image links.

use crate::field::TagField;
use crate::tags::TagValues;

/// BPM values below this are treated as corrupt.
pub const MIN_PLAUSIBLE_BPM: i64 = 30;

/// Inputs every rule sees.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    /// Values freshly decoded from the file
    pub source: &'a TagValues,
    /// Values the caller wants in the file
    pub target: &'a TagValues,
    pub replace: bool,
}

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub test: fn(&PolicyInput<'_>) -> bool,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

macro_rules! optional_rules {
    ($field:ident) => {
        &[
            Rule {
                name: "fill_missing",
                test: |p| p.source.$field.is_none() && p.target.$field.is_some(),
            },
            Rule {
                name: "replace",
                test: |p| p.replace && p.source.$field != p.target.$field,
            },
        ]
    };
}

macro_rules! collection_rules {
    ($field:ident) => {
        &[
            Rule {
                name: "fill_missing",
                test: |p| p.source.$field.is_empty() && !p.target.$field.is_empty(),
            },
            Rule {
                name: "replace",
                test: |p| p.replace && p.source.$field != p.target.$field,
            },
        ]
    };
}

macro_rules! pair_rules {
    ($number:ident, $total:ident) => {
        &[
            Rule {
                name: "fill_missing",
                test: |p| {
                    p.source.$number.is_none()
                        && p.source.$total.is_none()
                        && (p.target.$number.is_some() || p.target.$total.is_some())
                },
            },
            Rule {
                name: "replace",
                test: |p| {
                    p.replace
                        && (p.source.$number != p.target.$number || p.source.$total != p.target.$total)
                },
            },
        ]
    };
}

static TITLE: &[Rule] = optional_rules!(title);
static ARTIST: &[Rule] = optional_rules!(artist);
static ALBUM: &[Rule] = optional_rules!(album);
static ALBUM_ARTIST: &[Rule] = optional_rules!(album_artist);
static KEY: &[Rule] = optional_rules!(key);
static COMPILATION: &[Rule] = optional_rules!(compilation);
static TRACK: &[Rule] = pair_rules!(track_number, track_total);
static DISC: &[Rule] = pair_rules!(disc_number, disc_total);
static GENRES: &[Rule] = collection_rules!(genres);
static COMMENTS: &[Rule] = collection_rules!(comments);

static DATE: &[Rule] = &[
    Rule {
        name: "fill_missing",
        test: |p| {
            p.source.year.is_none()
                && p.source.month.is_none()
                && p.source.day.is_none()
                && (p.target.year.is_some() || p.target.month.is_some() || p.target.day.is_some())
        },
    },
    Rule {
        name: "replace",
        test: |p| {
            p.replace
                && (p.source.year != p.target.year
                    || p.source.month != p.target.month
                    || p.source.day != p.target.day)
        },
    },
];

static BPM: &[Rule] = &[
    Rule {
        name: "fill_missing",
        test: |p| p.source.bpm.is_none() && p.target.bpm.is_some() && plausible(p.target.bpm),
    },
    Rule {
        name: "implausible_source",
        test: |p| p.source.bpm.is_some() && !plausible(p.source.bpm) && plausible(p.target.bpm),
    },
    Rule {
        name: "replace",
        test: |p| p.replace && bpm_int(p.source.bpm) != bpm_int(p.target.bpm),
    },
];

static URI: &[Rule] = &[Rule {
    name: "changed",
    test: |p| p.source.uri != p.target.uri || p.source.has_uri != p.target.has_uri,
}];

static IMAGES: &[Rule] = &[
    Rule {
        name: "fill_missing",
        test: |p| !p.source.has_image && !p.target.image_links.is_empty(),
    },
    Rule {
        name: "replace",
        test: |p| p.replace && !p.target.image_links.is_empty(),
    },
];

fn bpm_int(bpm: Option<f64>) -> i64 {
    bpm.map(|b| b as i64).unwrap_or(0)
}

fn plausible(bpm: Option<f64>) -> bool {
    bpm_int(bpm) >= MIN_PLAUSIBLE_BPM
}

/// Rule table for a write unit. Non-unit fields have no rules.
pub fn rules(unit: TagField) -> &'static [Rule] {
    match unit {
        TagField::Title => TITLE,
        TagField::Artist => ARTIST,
        TagField::Album => ALBUM,
        TagField::AlbumArtist => ALBUM_ARTIST,
        TagField::Track => TRACK,
        TagField::Genres => GENRES,
        TagField::Date => DATE,
        TagField::Bpm => BPM,
        TagField::Key => KEY,
        TagField::Disc => DISC,
        TagField::Compilation => COMPILATION,
        TagField::Comments => COMMENTS,
        TagField::Uri => URI,
        TagField::Images => IMAGES,
        _ => &[],
    }
}

/// Index of the first rule that holds, `None` when the unit must not be
/// written.
pub fn evaluate(unit: TagField, input: &PolicyInput<'_>) -> Option<usize> {
    rules(unit).iter().position(|rule| (rule.test)(input))
}
