//! Supabase 存储
//!
//! 通过 PostgREST 读写表，通过 Storage API 上传音频。
//! 条件写入把期望状态放进 PATCH 的过滤条件，返回空集即视为冲突。

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, StoreConfig};
use crate::error::{ConfigError, PipelineError, Result};
use crate::infrastructure::store::ContentStore;
use crate::models::content_item::deserialize_question_id;
use crate::models::{ContentItem, ItemPatch, ItemStatus, QuestionRecord};

pub struct SupabaseStore {
    client: Client,
    config: StoreConfig,
}

#[derive(Deserialize)]
struct CourseRow {
    exam_id: Option<i64>,
}

#[derive(Deserialize)]
struct ExamRow {
    name: String,
}

#[derive(Deserialize)]
struct ClaimedRow {
    #[serde(deserialize_with = "deserialize_question_id")]
    question_id: String,
}

impl SupabaseStore {
    pub fn new(config: &Config) -> std::result::Result<Self, ConfigError> {
        let store = config.store.clone();
        if store.service_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                section: "store",
                key: "service_key",
            });
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&store.service_key).map_err(|_| {
            ConfigError::MissingCredential {
                section: "store",
                key: "service_key",
            }
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", store.service_key)).map_err(
            |_| ConfigError::MissingCredential {
                section: "store",
                key: "service_key",
            },
        )?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client,
            config: store,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn items_url(&self) -> String {
        self.table_url(&self.config.items_table)
    }

    fn questions_url(&self) -> String {
        self.table_url(&self.config.questions_table)
    }

    /// 公开访问地址
    pub fn public_url(&self, filename: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.audio_bucket,
            filename
        )
    }

    /// 题目已有条目时由数据库忽略这次插入，返回空集
    ///
    /// 依赖 `question_id` 列上的唯一约束。
    fn insert_request(&self, item: &ContentItem) -> RequestBuilder {
        self.client
            .post(self.items_url())
            .query(&[("on_conflict", "question_id")])
            .header("Prefer", "return=representation,resolution=ignore-duplicates")
            .json(item)
    }

    /// 发送请求并解析 JSON 数组
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Vec<T>> {
        let response = send(operation, request).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PipelineError::persistence(operation, e))
    }
}

async fn send(operation: &str, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| PipelineError::persistence(operation, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!("Supabase {} 返回 {}: {}", operation, status, body);
    Err(PipelineError::persistence(
        operation,
        format!("HTTP {}: {}", status, body),
    ))
}

/// PostgREST `in.(...)` 过滤值
fn status_filter(statuses: &[ItemStatus]) -> String {
    let values: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
    format!("in.({})", values.join(","))
}

#[async_trait]
impl ContentStore for SupabaseStore {
    async fn get_item(&self, id: Uuid) -> Result<ContentItem> {
        let request = self
            .client
            .get(self.items_url())
            .query(&[("id", format!("eq.{id}")), ("select", "*".to_string())]);
        let rows: Vec<ContentItem> = self.fetch_rows("get_item", request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PipelineError::not_found("条目", id))
    }

    async fn find_item_by_question(&self, question_id: &str) -> Result<Option<ContentItem>> {
        let request = self.client.get(self.items_url()).query(&[
            ("question_id", format!("eq.{question_id}")),
            ("select", "*".to_string()),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ContentItem> = self.fetch_rows("find_item_by_question", request).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_item(&self, item: &ContentItem) -> Result<ContentItem> {
        let request = self.insert_request(item);
        let rows: Vec<ContentItem> = self.fetch_rows("insert_item", request).await?;
        if let Some(inserted) = rows.into_iter().next() {
            return Ok(inserted);
        }

        // 插入被忽略：同一题目已有条目
        match self.find_item_by_question(&item.source_question_id).await? {
            Some(existing) => Err(PipelineError::Conflict {
                item: existing.id.to_string(),
                expected: item.status,
                actual: existing.status,
            }),
            None => Err(PipelineError::persistence("insert_item", "插入后未返回记录")),
        }
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: ItemStatus,
        patch: &ItemPatch,
    ) -> Result<ContentItem> {
        if !expected.can_advance_to(patch.status) {
            return Err(PipelineError::persistence(
                "update_if",
                format!("状态不能从 {} 回退到 {}", expected, patch.status),
            ));
        }

        let request = self
            .client
            .patch(self.items_url())
            .query(&[
                ("id", format!("eq.{id}")),
                ("status", format!("eq.{}", expected.as_str())),
            ])
            .header("Prefer", "return=representation")
            .json(patch);
        let rows: Vec<ContentItem> = self.fetch_rows("update_if", request).await?;

        match rows.into_iter().next() {
            Some(updated) => {
                debug!("条目 {} 状态: {} → {}", id, expected, updated.status);
                Ok(updated)
            }
            None => {
                // 没有命中：要么条目不存在，要么状态已变
                let current = self.get_item(id).await?;
                Err(PipelineError::Conflict {
                    item: id.to_string(),
                    expected,
                    actual: current.status,
                })
            }
        }
    }

    async fn find_by_status(
        &self,
        statuses: &[ItemStatus],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContentItem>> {
        let request = self.client.get(self.items_url()).query(&[
            ("status", status_filter(statuses)),
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        self.fetch_rows("find_by_status", request).await
    }

    async fn find_unused_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>> {
        let mut found = Vec::with_capacity(limit);
        let mut offset = 0;

        // 未使用的题目里有些已经生成了脚本（配音前），逐页排除
        while found.len() < limit {
            let request = self.client.get(self.questions_url()).query(&[
                ("used_in_video", "is.null".to_string()),
                ("select", "*".to_string()),
                ("order", "id.desc".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]);
            let page: Vec<QuestionRecord> =
                self.fetch_rows("find_unused_questions", request).await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            offset += page_len;

            let ids: Vec<&str> = page.iter().map(|q| q.id.as_str()).collect();
            let request = self.client.get(self.items_url()).query(&[
                ("question_id", format!("in.({})", ids.join(","))),
                ("select", "question_id".to_string()),
            ]);
            let claimed: Vec<ClaimedRow> = self.fetch_rows("find_claimed_questions", request).await?;

            found.extend(
                page.into_iter()
                    .filter(|q| claimed.iter().all(|c| c.question_id != q.id)),
            );
            if page_len < limit {
                break;
            }
        }

        found.truncate(limit);
        Ok(found)
    }

    async fn get_question(&self, question_id: &str) -> Result<QuestionRecord> {
        let request = self.client.get(self.questions_url()).query(&[
            ("id", format!("eq.{question_id}")),
            ("select", "*".to_string()),
        ]);
        let rows: Vec<QuestionRecord> = self.fetch_rows("get_question", request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PipelineError::not_found("题目", question_id))
    }

    async fn exam_name_for_course(&self, course_id: i64) -> Result<Option<String>> {
        let request = self.client.get(self.table_url("courses")).query(&[
            ("id", format!("eq.{course_id}")),
            ("select", "exam_id".to_string()),
        ]);
        let courses: Vec<CourseRow> = self.fetch_rows("get_course", request).await?;
        let Some(exam_id) = courses.into_iter().next().and_then(|c| c.exam_id) else {
            return Ok(None);
        };

        let request = self.client.get(self.table_url("exams")).query(&[
            ("id", format!("eq.{exam_id}")),
            ("select", "name".to_string()),
        ]);
        let exams: Vec<ExamRow> = self.fetch_rows("get_exam", request).await?;
        Ok(exams.into_iter().next().map(|e| e.name))
    }

    async fn mark_question_used(&self, question_id: &str) -> Result<()> {
        let request = self
            .client
            .patch(self.questions_url())
            .query(&[("id", format!("eq.{question_id}"))])
            .json(&json!({ "used_in_video": "yes" }));
        send("mark_question_used", request).await?;
        Ok(())
    }

    async fn upload_binary(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.audio_bucket,
            filename
        );
        debug!("上传 {} ({} 字节)", filename, bytes.len());

        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .header("cache-control", "3600")
            .body(bytes);
        send("upload_binary", request).await?;

        Ok(self.public_url(filename))
    }
}
