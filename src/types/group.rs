use super::Jid;
use serde::{Deserialize, Serialize};

/// Group metadata as returned by the participating-groups query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMetadata {
    pub id: Jid,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default)]
    pub participants: Vec<GroupParticipant>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupParticipant {
    pub id: Jid,
    /// `admin` or `superadmin`; absent for regular members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
}

/// Read-only projection served by `GET /api/groups`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: Jid,
    pub name: String,
    pub participants: Vec<Jid>,
}

impl From<&GroupMetadata> for GroupSummary {
    fn from(meta: &GroupMetadata) -> Self {
        Self {
            id: meta.id.clone(),
            name: meta.subject.clone(),
            participants: meta.participants.iter().map(|p| p.id.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_keeps_participant_order() {
        let meta = GroupMetadata {
            id: Jid::group("1203"),
            subject: "Family".into(),
            owner: None,
            creation: None,
            desc: None,
            participants: vec![
                GroupParticipant {
                    id: Jid::new("2", "s.whatsapp.net"),
                    admin: Some("admin".into()),
                },
                GroupParticipant {
                    id: Jid::new("1", "s.whatsapp.net"),
                    admin: None,
                },
            ],
        };
        let summary = GroupSummary::from(&meta);
        assert_eq!(summary.name, "Family");
        let v = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "id": "1203@g.us",
                "name": "Family",
                "participants": ["2@s.whatsapp.net", "1@s.whatsapp.net"]
            })
        );
    }
}
