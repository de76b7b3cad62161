use chrono::{NaiveDate, Utc};
use tracing::info;

use hyperbot_core::domain::sheet::{
    new_employee_skill_table, parse_candidate_offers, CandidateOffer, NewEmployeeSkill,
};
use hyperbot_core::validation::extract_sheet_id;

use crate::client::{CreatedSpreadsheet, SheetsClient};
use crate::SheetsError;

pub const CANDIDATE_OFFER_RANGE: &str = "A1:K20";
const SKILL_SHEET_RANGE: &str = "A1";

pub struct SheetService {
    client: SheetsClient,
    shared_drive_folder_id: String,
}

impl SheetService {
    pub fn new(client: SheetsClient, shared_drive_folder_id: impl Into<String>) -> Self {
        Self { client, shared_drive_folder_id: shared_drive_folder_id.into() }
    }

    /// Candidates listed in the offer sheet at `sheet_url`; rows without a
    /// full name are skipped.
    pub async fn read_candidate_offer(
        &self,
        sheet_url: &str,
    ) -> Result<Vec<CandidateOffer>, SheetsError> {
        let spreadsheet_id = extract_sheet_id(sheet_url)
            .map_err(|_| SheetsError::InvalidLink(sheet_url.to_owned()))?;
        let rows = self.client.read_range(&spreadsheet_id, CANDIDATE_OFFER_RANGE).await?;
        Ok(parse_candidate_offers(&rows))
    }

    pub async fn create_sheet(&self, title: &str) -> Result<CreatedSpreadsheet, SheetsError> {
        self.client.create_spreadsheet(title).await
    }

    pub async fn create_sheet_in_shared_drive(
        &self,
        title: &str,
    ) -> Result<CreatedSpreadsheet, SheetsError> {
        let created = self.client.create_spreadsheet(title).await?;
        let parents = self.client.file_parents(&created.spreadsheet_id).await?;
        self.client
            .move_to_folder(&created.spreadsheet_id, &self.shared_drive_folder_id, &parents)
            .await?;

        info!(
            event_name = "sheets.spreadsheet.created",
            spreadsheet_id = %created.spreadsheet_id,
            folder_id = %self.shared_drive_folder_id,
            "spreadsheet created in shared drive"
        );
        Ok(created)
    }

    pub async fn insert_new_employee_skills(
        &self,
        spreadsheet_id: &str,
        candidates: &[CandidateOffer],
    ) -> Result<(), SheetsError> {
        let employees: Vec<NewEmployeeSkill> = candidates.iter().map(NewEmployeeSkill::from).collect();
        let rows = new_employee_skill_table(&employees);
        self.client.write_rows(spreadsheet_id, SKILL_SHEET_RANGE, &rows).await
    }

    /// Copies the candidates of an offer sheet into a new dated skill sheet in
    /// the shared drive and returns that sheet.
    pub async fn handle_candidate_file(
        &self,
        sheet_url: &str,
    ) -> Result<CreatedSpreadsheet, SheetsError> {
        self.handle_candidate_file_on(sheet_url, Utc::now().date_naive()).await
    }

    pub(crate) async fn handle_candidate_file_on(
        &self,
        sheet_url: &str,
        today: NaiveDate,
    ) -> Result<CreatedSpreadsheet, SheetsError> {
        let candidates = self.read_candidate_offer(sheet_url).await?;
        let title = format!("New Employee Skill - {}", today.format("%Y-%m-%d"));
        let created = self.create_sheet_in_shared_drive(&title).await?;
        self.insert_new_employee_skills(&created.spreadsheet_id, &candidates).await?;
        Ok(created)
    }
}
