//! Work queues of questions.

use std::sync::Arc;

use rabj_core::{
    FetchPool, Locator, MapContainer, Method, Params, RequestDescriptor, ACCESS_KEY_PARAM,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

use crate::extract::{addressable, field, field_nodes, result_map};
use crate::question::{NewQuestion, Question};
use crate::Error;

/// Questions sent per POST by [`Queue::add_all`].
pub const DEFAULT_ADD_PAGESIZE: usize = 1000;
/// Questions fetched per GET by [`Queue::get_all`].
pub const DEFAULT_GET_PAGESIZE: usize = 5000;

/// Question state the server uses for unfinished questions.
pub const STATE_WANTING: &str = "wanting";
pub const STATE_COMPLETE: &str = "complete";

/// Options for [`Queue::get_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAll {
    /// Only questions in this state (`complete`, `wanting`, `partial`).
    pub state: Option<String>,
    /// Include the question body.
    pub body: bool,
    pub judgments: bool,
    /// Only questions since this time (`YYYY-MM-DD HH:MM:SS`).
    pub since: Option<String>,
    pub pagesize: usize,
}

impl Default for GetAll {
    fn default() -> Self {
        Self {
            state: None,
            body: true,
            judgments: false,
            since: None,
            pagesize: DEFAULT_GET_PAGESIZE,
        }
    }
}

impl GetAll {
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_judgments(mut self) -> Self {
        self.judgments = true;
        self
    }

    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = false;
        self
    }

    #[must_use]
    pub fn since(mut self, since: impl Into<String>) -> Self {
        self.since = Some(since.into());
        self
    }

    #[must_use]
    pub fn pagesize(mut self, pagesize: usize) -> Self {
        self.pagesize = pagesize.max(1);
        self
    }

    fn params(&self, offset: usize) -> Params {
        let mut params = Params::new()
            .with("limit", self.pagesize)
            .with("offset", offset);
        if let Some(since) = &self.since {
            params.insert("since", since.as_str());
        }
        if self.judgments {
            params.insert("judgments", true);
        }
        if self.body {
            params.insert("body", true);
        }
        params
    }
}

/// Question counters for a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub judgments: u64,
    pub complete: u64,
    /// The server's `wanting` count.
    pub incomplete: u64,
    pub started: u64,
    /// `complete + incomplete`.
    pub questions: u64,
}

impl QueueStatus {
    fn from_counters(counters: &Value) -> Self {
        let count = |name: &str| counters.get(name).and_then(Value::as_u64).unwrap_or(0);
        let complete = count("complete");
        let incomplete = count(STATE_WANTING);
        QueueStatus {
            judgments: count("judgments"),
            complete,
            incomplete,
            started: count("started"),
            questions: complete + incomplete,
        }
    }
}

/// A queue stored on the server.
#[derive(Debug, Clone)]
pub struct Queue {
    queue: MapContainer,
    status: Option<QueueStatus>,
}

impl Queue {
    pub fn new(queue: MapContainer) -> Self {
        Self {
            queue,
            status: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.queue.get_local(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.queue.insert(key, value)
    }

    pub fn remove_field(&mut self, key: &str) -> Option<Value> {
        self.queue.remove(key)
    }

    pub fn id(&self) -> Option<&str> {
        self.queue.id()
    }

    /// The access key stored on the queue, if the server returned one.
    pub fn access_key(&self) -> Option<&str> {
        self.queue.get_local(ACCESS_KEY_PARAM).and_then(Value::as_str)
    }

    pub fn container(&self) -> &MapContainer {
        &self.queue
    }

    pub fn into_container(self) -> MapContainer {
        self.queue
    }

    pub fn locator(&self) -> &Locator {
        self.queue.locator()
    }

    pub fn to_json(&self) -> Value {
        self.queue.to_json()
    }

    /// Save local modifications and adopt the server's copy.
    pub fn update(&mut self) -> Result<&mut Self, Error> {
        let response = self
            .queue
            .put(Params::new().with("queue", self.queue.to_json()))?;
        self.queue = result_map(response)?;
        Ok(self)
    }

    /// Add one question, returning what the server stored.
    pub fn add_one(&self, question: NewQuestion) -> Result<Vec<Question>, Error> {
        self.post_questions(&[question])
    }

    /// Add questions in POSTs of at most `pagesize`.
    pub fn add_all<I>(&self, questions: I, pagesize: usize) -> Result<Vec<Question>, Error>
    where
        I: IntoIterator<Item = NewQuestion>,
    {
        let pagesize = pagesize.max(1);
        let mut added = Vec::new();
        let mut payload = Vec::with_capacity(pagesize);
        for question in questions {
            payload.push(question);
            if payload.len() == pagesize {
                added.extend(self.post_questions(&payload)?);
                payload.clear();
            }
        }
        if !payload.is_empty() {
            added.extend(self.post_questions(&payload)?);
        }
        Ok(added)
    }

    /// A question by id, or the first question of the queue.
    pub fn get_one(&self, question_id: Option<&str>) -> Result<Option<Question>, Error> {
        match question_id {
            Some(id) => {
                let response = self.queue.locator().from_id(id)?.get(Params::new())?;
                Ok(Some(Question::new(result_map(response)?)))
            }
            None => {
                let response = self.questions()?.get(Params::new().with("limit", 1))?;
                let url = response.url();
                match field_nodes(&response, "questions")?.into_iter().next() {
                    Some(node) => Ok(Some(Question::new(addressable(node, &url)?))),
                    None => Ok(None),
                }
            }
        }
    }

    /// Every question matching `options`, paging until a short page.
    pub fn get_all(&self, options: &GetAll) -> Result<Vec<Question>, Error> {
        let locator = match &options.state {
            Some(state) => self.questions()?.child(state)?,
            None => self.questions()?,
        };

        let pagesize = options.pagesize.max(1);
        let mut questions = Vec::new();
        let mut offset = 0;
        loop {
            let response = locator.get(options.params(offset))?;
            let url = response.url();
            let page = field_nodes(&response, "questions")?;
            let fetched = page.len();
            for node in page {
                questions.push(Question::new(addressable(node, &url)?));
            }
            debug!(url = %url, offset, fetched, "fetched question page");
            if fetched < pagesize {
                break;
            }
            offset += pagesize;
        }
        Ok(questions)
    }

    pub fn completed_questions(&self, options: GetAll) -> Result<Vec<Question>, Error> {
        self.get_all(&options.state(STATE_COMPLETE))
    }

    pub fn incomplete_questions(&self, options: GetAll) -> Result<Vec<Question>, Error> {
        self.get_all(&options.state(STATE_WANTING))
    }

    /// Fetch questions by id on `workers` threads.
    ///
    /// Each slot holds its own result; one missing question does not fail
    /// the others.
    pub fn fetch_questions<S: AsRef<str>>(
        &self,
        ids: &[S],
        workers: usize,
    ) -> Result<Vec<Result<Question, Error>>, Error> {
        let locator = self.queue.locator();
        let descriptors = ids
            .iter()
            .map(|id| -> Result<RequestDescriptor, Error> {
                Ok(locator
                    .from_id(id.as_ref())?
                    .descriptor(Method::GET, Params::new()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let pool = FetchPool::new(Arc::clone(locator.transport()), workers);
        Ok(pool
            .submit_batch(descriptors)
            .into_iter()
            .map(|slot| -> Result<Question, Error> { Ok(Question::new(result_map(slot?)?)) })
            .collect())
    }

    /// Take questions off the queue; with `delete`, also delete each one.
    pub fn remove(&self, questions: &[Question], delete: bool) -> Result<Value, Error> {
        let ids: Vec<Value> = questions
            .iter()
            .filter_map(|q| q.id())
            .map(|id| json!({"id": id}))
            .collect();
        let response = self
            .questions()?
            .delete(Params::new().with("questions", ids))?;

        if delete {
            for question in questions {
                question.delete()?;
            }
        }
        Ok(response.value())
    }

    pub fn delete_cascade(&self, questions: &[Question]) -> Result<Value, Error> {
        self.remove(questions, true)
    }

    /// Take every question off the queue.
    pub fn remove_all(&self, delete: bool) -> Result<Value, Error> {
        let questions = self.get_all(&GetAll::default())?;
        self.remove(&questions, delete)
    }

    pub fn publish(&self) -> Result<(), Error> {
        self.published()?.put(Params::new())?;
        Ok(())
    }

    pub fn unpublish(&self) -> Result<(), Error> {
        self.published()?.delete(Params::new())?;
        Ok(())
    }

    pub fn is_published(&self) -> Result<bool, Error> {
        let response = self.published()?.get(Params::new())?;
        field(&response, "published")?
            .as_bool()
            .ok_or_else(|| Error::shape(response.url(), "a boolean 'published'"))
    }

    /// Fetch the question counters.
    pub fn status(&self) -> Result<QueueStatus, Error> {
        let response = self.queue.child("status")?.get(Params::new())?;
        let counters = field(&response, "status")?;
        Ok(QueueStatus::from_counters(&counters))
    }

    /// The counters, fetched on first use and cached.
    pub fn status_once(&mut self) -> Result<QueueStatus, Error> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.status()?;
        self.status = Some(status);
        Ok(status)
    }

    pub fn reset_status(&mut self) {
        self.status = None;
    }

    fn questions(&self) -> Result<Locator, Error> {
        Ok(self.queue.child("questions")?)
    }

    fn published(&self) -> Result<Locator, Error> {
        Ok(self.queue.child("published")?)
    }

    fn post_questions(&self, payload: &[NewQuestion]) -> Result<Vec<Question>, Error> {
        let params = Params::new().with_serialized("questions", &payload)?;
        let response = self.questions()?.post(params)?;
        let url = response.url();
        field_nodes(&response, "questions")?
            .into_iter()
            .map(|node| addressable(node, &url).map(Question::new))
            .collect()
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.queue == other.queue
    }
}

impl Serialize for Queue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.queue.serialize(serializer)
    }
}
