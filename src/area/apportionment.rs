//! Seats in the U.S. House of Representatives by state.
//!
//! Source: 2020 Census Apportionment Results, April 26, 2021, Table C1,
//! "Number of Seats in U.S. House of Representatives by State: 1910 to 2020".

/// House seats for one state after a given census.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seats {
    pub census_2020: u8,
    pub census_2010: u8,
}

const fn seats(census_2020: u8, census_2010: u8) -> Seats {
    Seats { census_2020, census_2010 }
}

/// Upper-case state code -> seats, plus three faux single-district states used in testing.
pub(crate) const APPORTIONMENT: [(&str, Seats); 53] = [
    ("AL", seats(7, 7)),
    ("AK", seats(1, 1)),
    ("AZ", seats(9, 9)),
    ("AR", seats(4, 4)),
    ("CA", seats(52, 53)),
    ("CO", seats(8, 7)),
    ("CT", seats(5, 5)),
    ("DE", seats(1, 1)),
    ("FL", seats(28, 27)),
    ("GA", seats(14, 14)),
    ("HI", seats(2, 2)),
    ("ID", seats(2, 2)),
    ("IL", seats(17, 18)),
    ("IN", seats(9, 9)),
    ("IA", seats(4, 4)),
    ("KS", seats(4, 4)),
    ("KY", seats(6, 6)),
    ("LA", seats(6, 6)),
    ("ME", seats(2, 2)),
    ("MD", seats(8, 8)),
    ("MA", seats(9, 9)),
    ("MI", seats(13, 14)),
    ("MN", seats(8, 8)),
    ("MS", seats(4, 4)),
    ("MO", seats(8, 8)),
    ("MT", seats(2, 1)),
    ("NE", seats(3, 3)),
    ("NV", seats(4, 4)),
    ("NH", seats(2, 2)),
    ("NJ", seats(12, 12)),
    ("NM", seats(3, 3)),
    ("NY", seats(26, 27)),
    ("NC", seats(14, 13)),
    ("ND", seats(1, 1)),
    ("OH", seats(15, 16)),
    ("OK", seats(5, 5)),
    ("OR", seats(6, 5)),
    ("PA", seats(17, 18)),
    ("RI", seats(2, 2)),
    ("SC", seats(7, 7)),
    ("SD", seats(1, 1)),
    ("TN", seats(9, 9)),
    ("TX", seats(38, 36)),
    ("UT", seats(4, 4)),
    ("VT", seats(1, 1)),
    ("VA", seats(11, 11)),
    ("WA", seats(10, 10)),
    ("WV", seats(2, 3)),
    ("WI", seats(8, 8)),
    ("WY", seats(1, 1)),
    ("XX", seats(1, 1)),
    ("YY", seats(1, 1)),
    ("ZZ", seats(1, 1)),
];

/// Look up the seat counts for an upper-case state code.
pub(crate) fn state_seats(state: &str) -> Option<Seats> {
    APPORTIONMENT.iter()
        .find(|(code, _)| *code == state)
        .map(|&(_, seats)| seats)
}
