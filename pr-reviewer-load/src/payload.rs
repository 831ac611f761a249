//! Request bodies sent to the PR reviewer service
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Members seeded into every team.
pub const MEMBERS_PER_TEAM: usize = 3;

pub const PULL_REQUEST_NAME: &str = "Load test PR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

/// Body of `POST /team/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPayload {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl TeamPayload {
    /// Team `team{n}` with active members `u{n}1..=u{n}3`.
    pub fn numbered(n: usize) -> Self {
        let members = (1..=MEMBERS_PER_TEAM)
            .map(|j| TeamMember {
                user_id: format!("u{n}{j}"),
                username: format!("User{n}{j}"),
                is_active: true,
            })
            .collect();

        Self {
            team_name: format!("team{n}"),
            members,
        }
    }
}

/// Body of `POST /pullRequest/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestPayload {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl PullRequestPayload {
    pub fn new(pull_request_id: String, author_id: String) -> Self {
        Self {
            pull_request_id,
            pull_request_name: PULL_REQUEST_NAME.to_string(),
            author_id,
        }
    }
}

/// The first member of a seeded team authors its pull requests: `team3` -> `u31`.
pub fn author_for_team(team: &str) -> String {
    format!("u{}1", team.replacen("team", "", 1))
}

/// `pr-<unix millis>-<random fraction>`. The random suffix keeps ids from concurrent VUs
/// apart within the same millisecond.
pub fn pull_request_id(rng: &mut impl Rng) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("pr-{millis}-{}", rng.gen::<f64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn numbered_team_shape() {
        let team = TeamPayload::numbered(4);
        let json = serde_json::to_value(&team).unwrap();

        assert_eq!(json["team_name"], "team4");
        assert_eq!(json["members"].as_array().unwrap().len(), 3);
        assert_eq!(json["members"][0]["user_id"], "u41");
        assert_eq!(json["members"][2]["username"], "User43");
        assert_eq!(json["members"][1]["is_active"], true);
    }

    #[test]
    fn author_is_first_member() {
        assert_eq!(author_for_team("team1"), "u11");
        assert_eq!(author_for_team("team5"), "u51");
        for n in 1..=5 {
            let team = TeamPayload::numbered(n);
            assert_eq!(author_for_team(&team.team_name), team.members[0].user_id);
        }
    }

    #[test]
    fn pull_request_ids_are_distinct() {
        let mut rng = SmallRng::seed_from_u64(7);
        let ids: HashSet<String> = (0..1_000).map(|_| pull_request_id(&mut rng)).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(ids.iter().all(|id| id.starts_with("pr-")));
    }

    #[test]
    fn pull_request_body() {
        let body = PullRequestPayload::new("pr-1-0.5".to_string(), "u21".to_string());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["pull_request_name"], "Load test PR");
        assert_eq!(json["author_id"], "u21");
        assert_eq!(json["pull_request_id"], "pr-1-0.5");
    }
}
