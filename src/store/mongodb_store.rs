use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use mongodb::options::{
    ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReplaceOptions,
    ReturnDocument,
};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{NewUser, SessionRecord, Story, StoryInput, StoryStatus, User};
use crate::store::{SessionStore, StoryStore, UserStore};

/// A concrete store that keeps sessions, users and stories in MongoDB.
pub struct MongoDBStore {
    session_collection: Collection<SessionDocument>,
    user_collection: Collection<UserDocument>,
    story_collection: Collection<StoryDocument>,
}

/// Document shape for sessions. The payload is kept as a JSON string.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct SessionDocument {
    #[serde(rename = "_id")]
    token: String,
    expires: bson::DateTime,
    touched_at: bson::DateTime,
    session: String,
}

/// Document shape for users.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct UserDocument {
    _id: ObjectId,
    google_id: String,
    display_name: String,
    first_name: String,
    last_name: String,
    image: Option<String>,
    created_at: bson::DateTime,
}

/// Document shape for stories. `user` holds the owner's id as hex.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct StoryDocument {
    _id: ObjectId,
    title: String,
    body: String,
    status: StoryStatus,
    user: String,
    created_at: bson::DateTime,
}

fn to_bson_date(dt: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(dt.timestamp_millis())
}

fn from_bson_date(dt: bson::DateTime) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| StoreError::Corrupt(format!("date out of range: {}", dt)))
}

/// Unknown or malformed ids are reported as "not found" by the callers.
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

impl MongoDBStore {
    /// Connects, checks the server is reachable and sets up indexes.
    pub async fn new(uri: &str, database: &str) -> Result<Self, StoreError> {
        info!("Connecting to MongoDB database '{}'", database);

        let mut client_options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse MongoDB URI: {}", e)))?;
        client_options.app_name = Some("StoryBooks".to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| StoreError::Unavailable(format!("Failed to create MongoDB client: {}", e)))?;

        let database = client.database(database);
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StoreError::Unavailable(format!("MongoDB ping failed: {}", e)))?;

        info!("MongoDB connection established successfully.");

        let session_collection = database.collection::<SessionDocument>("sessions");
        let user_collection = database.collection::<UserDocument>("users");
        let story_collection = database.collection::<StoryDocument>("stories");

        // 1) TTL index so the server removes expired sessions on its own
        let mut ttl_on_expires = IndexModel::default();
        ttl_on_expires.keys = doc! { "expires": 1 };
        ttl_on_expires.options = Some(
            IndexOptions::builder()
                .expire_after(Duration::from_secs(0))
                .build(),
        );
        session_collection.create_index(ttl_on_expires, None).await?;

        // 2) Unique index on the provider id
        let mut unique_on_google_id = IndexModel::default();
        unique_on_google_id.keys = doc! { "google_id": 1 };
        unique_on_google_id.options = Some(IndexOptions::builder().unique(true).build());
        user_collection.create_index(unique_on_google_id, None).await?;

        // 3) Stories are listed per owner
        let mut on_story_user = IndexModel::default();
        on_story_user.keys = doc! { "user": 1, "created_at": -1 };
        story_collection.create_index(on_story_user, None).await?;

        Ok(Self {
            session_collection,
            user_collection,
            story_collection,
        })
    }

    fn record_to_doc(record: &SessionRecord) -> Result<SessionDocument, StoreError> {
        Ok(SessionDocument {
            token: record.token.clone(),
            expires: to_bson_date(record.expires_at),
            touched_at: to_bson_date(record.touched_at),
            session: serde_json::to_string(&record.data)?,
        })
    }

    fn doc_to_record(doc: SessionDocument) -> Result<SessionRecord, StoreError> {
        let data: Map<String, Value> = serde_json::from_str(&doc.session)?;
        Ok(SessionRecord {
            token: doc.token,
            data,
            expires_at: from_bson_date(doc.expires)?,
            touched_at: from_bson_date(doc.touched_at)?,
        })
    }

    fn doc_to_user(doc: UserDocument) -> Result<User, StoreError> {
        Ok(User {
            id: doc._id.to_hex(),
            google_id: doc.google_id,
            display_name: doc.display_name,
            first_name: doc.first_name,
            last_name: doc.last_name,
            image: doc.image,
            created_at: from_bson_date(doc.created_at)?,
        })
    }

    fn doc_to_story(doc: StoryDocument) -> Result<Story, StoreError> {
        Ok(Story {
            id: doc._id.to_hex(),
            title: doc.title,
            body: doc.body,
            status: doc.status,
            user: doc.user,
            created_at: from_bson_date(doc.created_at)?,
        })
    }

    async fn find_stories(&self, filter: Document) -> Result<Vec<Story>, StoreError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let docs: Vec<StoryDocument> = self
            .story_collection
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        docs.into_iter().map(Self::doc_to_story).collect()
    }
}

#[async_trait]
impl SessionStore for MongoDBStore {
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, StoreError> {
        // The TTL monitor runs periodically, so expired documents may still be around.
        let filter = doc! { "_id": token, "expires": { "$gt": to_bson_date(Utc::now()) } };
        match self.session_collection.find_one(filter, None).await? {
            Some(doc) => Ok(Some(Self::doc_to_record(doc)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let doc = Self::record_to_doc(record)?;
        self.session_collection
            .replace_one(
                doc! { "_id": &record.token },
                doc,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.session_collection
            .update_one(
                doc! { "_id": token },
                doc! { "$set": {
                    "expires": to_bson_date(expires_at),
                    "touched_at": to_bson_date(Utc::now()),
                } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), StoreError> {
        self.session_collection
            .delete_one(doc! { "_id": token }, None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for MongoDBStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        self.user_collection
            .find_one(doc! { "_id": oid }, None)
            .await?
            .map(Self::doc_to_user)
            .transpose()
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        self.user_collection
            .find_one(doc! { "google_id": google_id }, None)
            .await?
            .map(Self::doc_to_user)
            .transpose()
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let oid = ObjectId::new();
        let user = User::from_new(oid.to_hex(), new_user);
        let doc = UserDocument {
            _id: oid,
            google_id: user.google_id.clone(),
            display_name: user.display_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image: user.image.clone(),
            created_at: to_bson_date(user.created_at),
        };

        if let Err(e) = self.user_collection.insert_one(doc, None).await {
            // Two concurrent first logins race on the unique index; the loser reuses the winner.
            debug!("Insert of user failed ({}), checking for a concurrent insert.", e);
            return self
                .find_by_google_id(&user.google_id)
                .await?
                .ok_or_else(|| StoreError::from(e));
        }
        Ok(user)
    }
}

#[async_trait]
impl StoryStore for MongoDBStore {
    async fn create_story(&self, user_id: &str, input: StoryInput) -> Result<Story, StoreError> {
        let oid = ObjectId::new();
        let story = Story::from_input(oid.to_hex(), user_id.to_string(), input);
        let doc = StoryDocument {
            _id: oid,
            title: story.title.clone(),
            body: story.body.clone(),
            status: story.status,
            user: story.user.clone(),
            created_at: to_bson_date(story.created_at),
        };
        self.story_collection.insert_one(doc, None).await?;
        Ok(story)
    }

    async fn find_story(&self, id: &str) -> Result<Option<Story>, StoreError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        self.story_collection
            .find_one(doc! { "_id": oid }, None)
            .await?
            .map(Self::doc_to_story)
            .transpose()
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Story>, StoreError> {
        self.find_stories(doc! { "user": user_id }).await
    }

    async fn list_public(&self, user_id: Option<&str>) -> Result<Vec<Story>, StoreError> {
        let mut filter = doc! { "status": StoryStatus::Public.as_str() };
        if let Some(user_id) = user_id {
            filter.insert("user", user_id);
        }
        self.find_stories(filter).await
    }

    async fn update_story(&self, id: &str, input: StoryInput) -> Result<Option<Story>, StoreError> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.story_collection
            .find_one_and_update(
                doc! { "_id": oid },
                doc! { "$set": {
                    "title": input.title,
                    "body": input.body,
                    "status": input.status.as_str(),
                } },
                options,
            )
            .await?
            .map(Self::doc_to_story)
            .transpose()
    }

    async fn delete_story(&self, id: &str) -> Result<bool, StoreError> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        let result = self
            .story_collection
            .delete_one(doc! { "_id": oid }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }
}
