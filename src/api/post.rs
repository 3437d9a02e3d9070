use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::authz::Target;

use super::user::UserId;
use super::{check_text, parse_json_body, parse_path_id, require_text, QueryRequest, Request};

pub type PostId = u64;

pub const TOPIC_MAX_LEN: usize = 50;
pub const CONTENT_MAX_LEN: usize = 255;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Post {
    pub id: PostId,
    pub topic: String,
    pub content: String,
    pub user: Author,
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct GetPostsRequest {
    pub query: QueryRequest,
}

impl Request for GetPostsRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.query.complete(fields)
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct GetPostRequest {
    pub id: PostId,
}

impl Request for GetPostRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct CreatePostRequest {
    pub topic: Option<String>,
    pub content: Option<String>,
    pub user_id: Option<UserId>,
}

impl Request for CreatePostRequest {
    fn has_body(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: &[u8]) -> Result<()> {
        *self = parse_json_body(body)?;
        Ok(())
    }

    /// The owner of a new post is whoever the body claims it to be.
    fn target(&self) -> Option<Target> {
        Some(Target::Claimed(self.user_id))
    }

    fn validate(&self) -> Result<()> {
        require_text("topic", &self.topic, TOPIC_MAX_LEN)?;
        require_text("content", &self.content, CONTENT_MAX_LEN)?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct PostBody {
    pub topic: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct PatchPostRequest {
    pub id: PostId,
    pub body: PostBody,
}

impl Request for PatchPostRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn has_body(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: &[u8]) -> Result<()> {
        self.body = parse_json_body(body)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref topic) = self.body.topic {
            check_text("topic", topic, TOPIC_MAX_LEN)?;
        }
        if let Some(ref content) = self.body.content {
            check_text("content", content, CONTENT_MAX_LEN)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct DeletePostRequest {
    pub id: PostId,
}

impl Request for DeletePostRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }
}
