//! Leave-request catalogue used by the leave form and the leave process input.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub code: i64,
    pub name: &'static str,
}

pub const LEAVE_TYPES: &[CatalogueEntry] = &[
    CatalogueEntry { code: 35, name: "Unpaid Leave" },
    CatalogueEntry { code: 39, name: "Remote work" },
    CatalogueEntry { code: 44, name: "Maternity leave" },
    CatalogueEntry {
        code: 45,
        name: "Family business (Applicable to self/child/father/mother)",
    },
    CatalogueEntry { code: 56, name: "Onsite" },
    CatalogueEntry { code: 57, name: "Absence to deal with company affairs" },
    CatalogueEntry { code: 59, name: "Business travel" },
    CatalogueEntry { code: 60, name: "Forgot timekeeping" },
    CatalogueEntry { code: 65, name: "Onboard (0 remaining out of 0 days)" },
];

pub const WORKING_TIMES: &[CatalogueEntry] = &[
    CatalogueEntry { code: 35, name: "8:00 - 17:30" },
    CatalogueEntry { code: 36, name: "8:30 - 18:00" },
    CatalogueEntry { code: 37, name: "9:00 - 18:30" },
];

/// Maps a timepicker value to the ERP hour code.
///
/// Whole hours map to the hour itself and half hours to the negated next hour
/// (`08:30` is `-9`). The lunch break `12:30`/`13:00` and anything outside
/// `08:00..=18:30` map to `0`.
pub fn hour_code(time: &str) -> i64 {
    let Some((hour, minute)) = time.trim().split_once(':') else {
        return 0;
    };
    if hour.len() != 2 || minute.len() != 2 {
        return 0;
    }
    let (Ok(hour), Ok(minute)) = (hour.parse::<i64>(), minute.parse::<i64>()) else {
        return 0;
    };

    match (hour, minute) {
        (12, 30) | (13, 0) => 0,
        (8..=18, 0) => hour,
        (8..=18, 30) => -(hour + 1),
        _ => 0,
    }
}
