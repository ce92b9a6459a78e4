mod lengths;
mod postings;

pub use lengths::{DocumentLengths, LengthTable};
pub use postings::{
    ImpactCursor, ImpactList, Posting, PostingCursor, PostingList, PostingListBuilder, TERMINATED,
};
