//! The portal's markup contract. These values track one specific portal
//! release and are intentionally not configurable.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Request,
    Complaint,
    Reminder,
}

impl Section {
    /// Order of one extraction pass.
    pub const ALL: [Section; 3] = [Section::Request, Section::Complaint, Section::Reminder];

    pub fn component(&self) -> &'static str {
        match self {
            Section::Request => "request",
            Section::Complaint => "complaint",
            Section::Reminder => "reminder",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component())
    }
}

#[derive(Debug, Clone)]
pub struct LoginSelectors {
    pub username: String,
    pub password: String,
    pub submit: String,
}

#[derive(Debug, Clone)]
pub struct LogoutSelectors {
    pub settings: String,
    pub sign_out: String,
}

/// Per-row status filter used by the complaint and reminder views.
#[derive(Debug, Clone)]
pub struct RowFilter {
    /// Suffix of the status cell id; the row index is prepended.
    pub cell_suffix: String,
    pub target_status: String,
}

impl RowFilter {
    pub fn cell_selector(&self, index: u32) -> String {
        format!("td[id='{}']", row_id(index, &self.cell_suffix))
    }
}

pub fn row_id(index: u32, suffix: &str) -> String {
    format!("{index}{suffix}")
}

/// Saved-query option picked from the dropdown of the request view.
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub option_label: String,
}

#[derive(Debug, Clone)]
pub struct SectionSelectors {
    pub section: Section,
    pub target: String,
    pub verify: String,
    pub label: String,
    pub query: Option<QueryFilter>,
    pub rows: Option<RowFilter>,
}

#[derive(Debug, Clone)]
pub struct PortalSelectors {
    pub login: LoginSelectors,
    pub logout: LogoutSelectors,
    /// Marker that only exists once the home screen loaded.
    pub home_marker: String,
    /// Banner carrying login errors.
    pub status_bar: String,
    pub invalid_credentials_marker: String,
    pub overlay: String,
    pub loading_status: String,
    pub loading_done_text: String,
    pub row_counter: String,
    pub no_records_marker: String,
    pub saved_query_options: String,
    pub request: SectionSelectors,
    pub complaint: SectionSelectors,
    pub reminder: SectionSelectors,
}

impl PortalSelectors {
    pub fn section(&self, section: Section) -> &SectionSelectors {
        match section {
            Section::Request => &self.request,
            Section::Complaint => &self.complaint,
            Section::Reminder => &self.reminder,
        }
    }

    pub fn section_targets(&self) -> [&str; 3] {
        [
            self.request.target.as_str(),
            self.complaint.target.as_str(),
            self.reminder.target.as_str(),
        ]
    }

    pub fn login_form(&self) -> [&str; 3] {
        [
            self.login.username.as_str(),
            self.login.password.as_str(),
            self.login.submit.as_str(),
        ]
    }
}

impl Default for PortalSelectors {
    fn default() -> Self {
        Self {
            login: LoginSelectors {
                username: "input[title='用户 ID']".into(),
                password: "input[title='密码']".into(),
                submit: "img[alt='登录']".into(),
            },
            logout: LogoutSelectors {
                settings: "li[title='设置']".into(),
                sign_out: "button[un='注销']".into(),
            },
            home_marker: "span[title='诉求']".into(),
            status_bar: "div#statusBar".into(),
            invalid_credentials_marker: "密码有误".into(),
            overlay: "div#mask-img".into(),
            loading_status: "div#maskcontent".into(),
            loading_done_text: "完成".into(),
            row_counter: "span#s_1_rc.siebui-row-counter".into(),
            no_records_marker: "无记录".into(),
            saved_query_options: "select[title='已保存的查询'] option".into(),
            request: SectionSelectors {
                section: Section::Request,
                target: "a[data-tabindex='tabView0']".into(),
                verify: "li[aria-label='诉求单列表 已选择']".into(),
                label: "诉求 - 未处理紧急诉求（本日）".into(),
                query: Some(QueryFilter {
                    option_label: "未处理紧急诉求（本日）".into(),
                }),
                rows: None,
            },
            complaint: SectionSelectors {
                section: Section::Complaint,
                target: "a[data-tabindex='tabView2']".into(),
                verify: "li[aria-label='投诉 已选择']".into(),
                label: "投诉 - 本日创建的诉求（新建）".into(),
                query: None,
                rows: Some(RowFilter {
                    cell_suffix: "_s_1_l_FT_Process_Status".into(),
                    target_status: "新建".into(),
                }),
            },
            reminder: SectionSelectors {
                section: Section::Reminder,
                target: "a[data-tabindex='tabView8']".into(),
                verify: "li[aria-label='催单记录 已选择']".into(),
                label: "催单 - 当日催单诉求（未处理）".into(),
                query: None,
                rows: Some(RowFilter {
                    cell_suffix: "_s_1_l_FT_Collection_Result".into(),
                    target_status: "未处理".into(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_cells_prefix_the_index() {
        let selectors = PortalSelectors::default();
        let rows = selectors.complaint.rows.as_ref().unwrap();
        assert_eq!(row_id(3, &rows.cell_suffix), "3_s_1_l_FT_Process_Status");
        assert_eq!(
            rows.cell_selector(12),
            "td[id='12_s_1_l_FT_Process_Status']"
        );
    }

    #[test]
    fn only_request_uses_saved_query_and_no_row_filter() {
        let selectors = PortalSelectors::default();
        for section in Section::ALL {
            let view = selectors.section(section);
            assert_eq!(view.section, section);
            assert_eq!(view.query.is_some(), section == Section::Request);
            assert_eq!(view.rows.is_some(), section != Section::Request);
        }
    }
}
