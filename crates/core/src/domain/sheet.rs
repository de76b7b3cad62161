//! Typed rows for the candidate-offer and new-employee-skill spreadsheets.

use serde::{Deserialize, Serialize};

pub const CANDIDATE_OFFER_HEADERS: [&str; 11] = [
    "No",
    "Full Name",
    "Position",
    "Accept-offer date",
    "Expected-onboard date",
    "Division",
    "HR",
    "Point",
    "Level",
    "Close-request date",
    "Source",
];

pub const NEW_EMPLOYEE_SKILL_HEADERS: [&str; 15] = [
    "Full Name",
    "Email",
    "Date of Birth",
    "Contract Type",
    "Working Form",
    "Office Tower",
    "Position",
    "Level",
    "Project",
    "PM",
    "On-Boarding Date",
    "Division Lead",
    "Division",
    "Skill",
    "Link CV",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateOffer {
    pub id: String,
    pub full_name: String,
    pub position: String,
    pub accept_date: String,
    pub onboard_date: String,
    pub division: String,
    pub hr: String,
    pub point: String,
    pub level: String,
    pub close_request_date: String,
    pub source: String,
}

impl CandidateOffer {
    fn set(&mut self, header: &str, value: String) {
        let slot = match header.trim() {
            "No" => &mut self.id,
            "Full Name" => &mut self.full_name,
            "Position" => &mut self.position,
            "Accept-offer date" => &mut self.accept_date,
            "Expected-onboard date" => &mut self.onboard_date,
            "Division" => &mut self.division,
            "HR" => &mut self.hr,
            "Point" => &mut self.point,
            "Level" => &mut self.level,
            "Close-request date" => &mut self.close_request_date,
            "Source" => &mut self.source,
            _ => return,
        };
        *slot = value;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployeeSkill {
    pub full_name: String,
    pub email: String,
    pub date_of_birth: String,
    pub contract_type: String,
    pub working_form: String,
    pub office_tower: String,
    pub position: String,
    pub level: String,
    pub project: String,
    pub pm: String,
    pub onboarding_date: String,
    pub division_lead: String,
    pub division: String,
    pub skill: String,
    pub link_cv: String,
}

impl NewEmployeeSkill {
    /// Cells in [`NEW_EMPLOYEE_SKILL_HEADERS`] order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.full_name.clone(),
            self.email.clone(),
            self.date_of_birth.clone(),
            self.contract_type.clone(),
            self.working_form.clone(),
            self.office_tower.clone(),
            self.position.clone(),
            self.level.clone(),
            self.project.clone(),
            self.pm.clone(),
            self.onboarding_date.clone(),
            self.division_lead.clone(),
            self.division.clone(),
            self.skill.clone(),
            self.link_cv.clone(),
        ]
    }
}

impl From<&CandidateOffer> for NewEmployeeSkill {
    fn from(offer: &CandidateOffer) -> Self {
        Self {
            full_name: offer.full_name.clone(),
            position: offer.position.clone(),
            division: offer.division.clone(),
            level: offer.level.clone(),
            onboarding_date: offer.onboard_date.clone(),
            ..Self::default()
        }
    }
}

/// Maps a value range whose first row is the header onto candidate rows.
///
/// Unknown headers are ignored and short rows leave the remaining fields
/// empty. Rows without a full name are dropped.
pub fn parse_candidate_offers(rows: &[Vec<String>]) -> Vec<CandidateOffer> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };

    body.iter()
        .map(|row| {
            let mut offer = CandidateOffer::default();
            for (column, cell) in header.iter().zip(row.iter()) {
                offer.set(column, cell.trim().to_owned());
            }
            offer
        })
        .filter(|offer| !offer.full_name.is_empty())
        .collect()
}

/// Header row followed by one row per employee.
pub fn new_employee_skill_table(employees: &[NewEmployeeSkill]) -> Vec<Vec<String>> {
    let mut table = Vec::with_capacity(employees.len() + 1);
    table.push(NEW_EMPLOYEE_SKILL_HEADERS.iter().map(|h| (*h).to_owned()).collect());
    table.extend(employees.iter().map(NewEmployeeSkill::to_row));
    table
}

#[cfg(test)]
mod tests {
    use super::{
        new_employee_skill_table, parse_candidate_offers, NewEmployeeSkill,
        NEW_EMPLOYEE_SKILL_HEADERS,
    };

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn header_row_drives_column_mapping() {
        let rows = vec![
            row(&["No", "Position", "Full Name", "Expected-onboard date", "Division", "Level"]),
            row(&["1", "QA", "Nguyen Van B", "2026-11-02", "D2", "Junior"]),
            row(&["2", "Dev", "", "2026-11-09", "D1", "Senior"]),
            row(&["3", "PM", "Le Thi C"]),
        ];

        let offers = parse_candidate_offers(&rows);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].full_name, "Nguyen Van B");
        assert_eq!(offers[0].position, "QA");
        assert_eq!(offers[0].onboard_date, "2026-11-02");
        assert_eq!(offers[1].full_name, "Le Thi C");
        assert!(offers[1].division.is_empty());
    }

    #[test]
    fn empty_range_yields_no_rows() {
        assert!(parse_candidate_offers(&[]).is_empty());
        assert!(parse_candidate_offers(&[row(&["No", "Full Name"])]).is_empty());
    }

    #[test]
    fn skill_table_starts_with_header_row() {
        let rows = vec![
            row(&["Full Name", "Position", "Division", "Level", "Expected-onboard date"]),
            row(&["Tran D", "Designer", "D3", "Middle", "2026-12-01"]),
        ];
        let employees: Vec<NewEmployeeSkill> =
            parse_candidate_offers(&rows).iter().map(NewEmployeeSkill::from).collect();

        let table = new_employee_skill_table(&employees);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].len(), NEW_EMPLOYEE_SKILL_HEADERS.len());
        assert_eq!(table[1][0], "Tran D");
        assert_eq!(table[1][6], "Designer");
        assert_eq!(table[1][10], "2026-12-01");
        assert_eq!(table[1][12], "D3");
    }
}
