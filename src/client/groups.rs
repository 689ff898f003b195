//! Participating-groups query and response parsing.

use crate::binary::Node;
use crate::types::{GroupMetadata, GroupParticipant, Jid, GROUP_SERVER};
use crate::{Error, Result};

/// `iq` asking for every group the account participates in, with members and description.
pub fn participating_query() -> Node {
    Node::new("iq")
        .with_attr("to", GROUP_SERVER)
        .with_attr("type", "get")
        .with_attr("xmlns", "w:g2")
        .with_children(vec![Node::new("participating")
            .with_children(vec![Node::new("participants"), Node::new("description")])])
}

/// Parse the `<groups>` child of the query response.
pub fn parse_participating(resp: &Node) -> Result<Vec<GroupMetadata>> {
    let groups = resp
        .get_child_by_tag("groups")
        .ok_or_else(|| Error::Binary("participating response without <groups>".into()))?;
    groups.children_by_tag("group").map(parse_group).collect()
}

fn parse_group(node: &Node) -> Result<GroupMetadata> {
    let id = node
        .attr("id")
        .ok_or_else(|| Error::Binary("group without id".into()))?;
    let id = if id.contains('@') {
        id.parse::<Jid>()?
    } else {
        Jid::group(id)
    };
    let participants = node
        .children_by_tag("participant")
        .filter_map(|p| {
            let jid = p.attr("jid")?.parse::<Jid>().ok()?;
            Some(GroupParticipant {
                id: jid,
                admin: p.attr("type").map(str::to_string),
            })
        })
        .collect();
    let desc = node
        .get_child_by_tag("description")
        .and_then(|d| d.get_child_by_tag("body"))
        .and_then(Node::text);
    Ok(GroupMetadata {
        id,
        subject: node.attr("subject").unwrap_or_default().to_string(),
        owner: node.attr("creator").and_then(|c| c.parse().ok()),
        creation: node.attr_parsed("creation"),
        desc,
        participants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Node {
        Node::new("iq")
            .with_attr("type", "result")
            .with_children(vec![Node::new("groups").with_children(vec![
                Node::new("group")
                    .with_attr("id", "120363001")
                    .with_attr("subject", "Team")
                    .with_attr("creator", "111@s.whatsapp.net")
                    .with_attr("creation", "1690000000")
                    .with_children(vec![
                        Node::new("participant")
                            .with_attr("jid", "111@s.whatsapp.net")
                            .with_attr("type", "superadmin"),
                        Node::new("participant").with_attr("jid", "222@s.whatsapp.net"),
                        Node::new("description").with_children(vec![
                            Node::new("body").with_content("weekly sync"),
                        ]),
                    ]),
                Node::new("group").with_attr("id", "120363002@g.us"),
            ])])
    }

    #[test]
    fn query_targets_group_server() {
        let q = participating_query();
        assert_eq!(q.attr("to"), Some("g.us"));
        assert_eq!(q.attr("xmlns"), Some("w:g2"));
        assert!(q.get_child_by_tag("participating").is_some());
    }

    #[test]
    fn parses_groups_and_participants() {
        let groups = parse_participating(&response()).unwrap();
        assert_eq!(groups.len(), 2);
        let team = &groups[0];
        assert_eq!(team.id.to_string(), "120363001@g.us");
        assert_eq!(team.subject, "Team");
        assert_eq!(team.creation, Some(1_690_000_000));
        assert_eq!(team.desc.as_deref(), Some("weekly sync"));
        assert_eq!(team.participants.len(), 2);
        assert_eq!(team.participants[0].admin.as_deref(), Some("superadmin"));
        assert_eq!(team.participants[1].admin, None);

        let bare = &groups[1];
        assert_eq!(bare.id.to_string(), "120363002@g.us");
        assert_eq!(bare.subject, "");
        assert!(bare.participants.is_empty());
    }

    #[test]
    fn missing_groups_child_is_an_error() {
        let resp = Node::new("iq").with_attr("type", "result");
        assert!(matches!(parse_participating(&resp), Err(Error::Binary(_))));
    }
}
