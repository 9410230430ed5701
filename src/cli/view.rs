//! Filter, sort and page arguments for commands that read the active view

use clap::Args;
use rust_decimal::Decimal;

use crate::compose::{Direction, Employment, FilterSet, SortSpec};
use crate::explorer::Explorer;

#[derive(Debug, Clone, Default, Args)]
pub struct ViewArgs {
    /// Keep only these employers (repeatable)
    #[arg(long = "employer")]
    pub employers: Vec<String>,

    /// Keep only these job titles (repeatable)
    #[arg(long = "job-title")]
    pub job_titles: Vec<String>,

    /// Case-insensitive employer substring
    #[arg(long)]
    pub employer_search: Option<String>,

    /// Case-insensitive job title substring
    #[arg(long)]
    pub job_title_search: Option<String>,

    /// Worksite state, e.g. CA
    #[arg(long)]
    pub state: Option<String>,

    #[arg(long)]
    pub min_salary: Option<Decimal>,

    #[arg(long)]
    pub max_salary: Option<Decimal>,

    /// Case status, e.g. Certified
    #[arg(long)]
    pub status: Option<String>,

    /// new or continued
    #[arg(long)]
    pub employment: Option<Employment>,

    /// Drop the saved filters before applying these
    #[arg(long)]
    pub clear_filters: bool,

    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort direction (asc or desc)
    #[arg(long, default_value = "asc")]
    pub direction: Direction,

    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: usize,
}

impl ViewArgs {
    fn has_filters(&self) -> bool {
        !self.employers.is_empty()
            || !self.job_titles.is_empty()
            || self.employer_search.is_some()
            || self.job_title_search.is_some()
            || self.state.is_some()
            || self.min_salary.is_some()
            || self.max_salary.is_some()
            || self.status.is_some()
            || self.employment.is_some()
    }

    /// Merge the given filters into `base`; unspecified fields keep their value.
    pub fn merge_into(&self, base: &FilterSet) -> FilterSet {
        let mut filters = if self.clear_filters {
            FilterSet::default()
        } else {
            base.clone()
        };
        if !self.employers.is_empty() {
            filters.employers = self.employers.clone();
        }
        if !self.job_titles.is_empty() {
            filters.job_titles = self.job_titles.clone();
        }
        if let Some(search) = &self.employer_search {
            filters.employer_search = search.clone();
        }
        if let Some(search) = &self.job_title_search {
            filters.job_title_search = search.clone();
        }
        if let Some(state) = &self.state {
            filters.state = state.clone();
        }
        if self.min_salary.is_some() {
            filters.min_salary = self.min_salary;
        }
        if self.max_salary.is_some() {
            filters.max_salary = self.max_salary;
        }
        if let Some(status) = &self.status {
            filters.status = status.clone();
        }
        if self.employment.is_some() {
            filters.employment = self.employment;
        }
        filters
    }

    /// Apply to the session. Filter changes are saved with the session state.
    pub fn apply(&self, explorer: &mut Explorer) {
        if self.clear_filters || self.has_filters() {
            let filters = self.merge_into(explorer.filters());
            explorer.set_filters(filters);
        }
        if let Some(column) = &self.sort {
            explorer.set_sort(SortSpec::by(column.as_str(), self.direction));
        }
        explorer.set_page(self.page);
    }
}
