/// Data layer: record decoding, catalog lookup, and label filtering.
///
/// Architecture:
/// ```text
///   data/samples/<partition>/<stem>.{hea,mat}
///        │
///        ▼
///   ┌──────────┐
///   │  corpus   │  enumerate stems, filter by declared length (headers only)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐        ┌──────────┐
///   │  header   │ codes  │ catalog  │  code ↔ description, relevant set
///   └──────────┘───┐    └──────────┘
///                  ▼         │
///             ┌──────────┐   │
///             │  filter   │◄──┘  codes ∩ relevant, sorted, deduplicated
///             └──────────┘
///                  │ records with relevant labels
///                  ▼
///   ┌──────────┐
///   │  signal   │  .mat → [12 × samples] (via matfile)
///   └──────────┘
/// ```

pub mod catalog;
pub mod corpus;
pub mod filter;
pub mod header;
pub mod matfile;
pub mod record;
pub mod signal;
