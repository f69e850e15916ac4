//! One method per resource-action pair.
//!
//! Each method assembles its payload, picks an `Endpoint`, calls
//! `JoplinApi::query` and returns the response untouched. Nothing here checks
//! business rules (a parent folder existing, a tag being attached); the
//! service answers those.

use serde_json::json;

use crate::client::JoplinApi;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::http::{HttpMethod, HttpResponse, Transport};
use crate::payload::{to_payload, FolderFields, FolderOptions, NoteFields, NoteOptions, Payload, ResourceOptions};

use HttpMethod::{Delete, Get, Post, Put};

impl<T: Transport> JoplinApi<T> {
    fn get(&self, endpoint: Endpoint) -> Result<HttpResponse> {
        self.query(Get, &endpoint, &Payload::new())
    }

    fn send(&self, method: HttpMethod, endpoint: Endpoint, payload: serde_json::Value) -> Result<HttpResponse> {
        self.query(method, &endpoint, &to_payload(&payload)?)
    }

    // ---------------------------------------------------------------------
    // Notes
    // ---------------------------------------------------------------------

    pub fn get_notes(&self) -> Result<HttpResponse> {
        self.get(Endpoint::Notes)
    }

    pub fn get_note(&self, note_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::Note(note_id.to_string()))
    }

    /// Tags attached to a note.
    pub fn get_notes_tags(&self, note_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::NoteTags(note_id.to_string()))
    }

    pub fn create_note(&self, title: &str, body: &str, parent_id: &str, options: &NoteOptions) -> Result<HttpResponse> {
        let fields = NoteFields {
            title,
            body,
            parent_id,
            options,
        };
        self.query(Post, &Endpoint::Notes, &to_payload(&fields)?)
    }

    pub fn update_note(
        &self,
        note_id: &str,
        title: &str,
        body: &str,
        parent_id: &str,
        options: &NoteOptions,
    ) -> Result<HttpResponse> {
        let fields = NoteFields {
            title,
            body,
            parent_id,
            options,
        };
        self.query(Put, &Endpoint::Note(note_id.to_string()), &to_payload(&fields)?)
    }

    pub fn move_note(&self, note_id: &str, parent_id: &str) -> Result<HttpResponse> {
        self.send(Put, Endpoint::Note(note_id.to_string()), json!({ "parent_id": parent_id }))
    }

    pub fn rename_note(&self, note_id: &str, title: &str) -> Result<HttpResponse> {
        self.send(Put, Endpoint::Note(note_id.to_string()), json!({ "title": title }))
    }

    pub fn delete_note(&self, note_id: &str) -> Result<HttpResponse> {
        self.query(Delete, &Endpoint::Note(note_id.to_string()), &Payload::new())
    }

    // ---------------------------------------------------------------------
    // Folders
    // ---------------------------------------------------------------------

    pub fn get_folders(&self) -> Result<HttpResponse> {
        self.get(Endpoint::Folders)
    }

    pub fn get_folder(&self, folder_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::Folder(folder_id.to_string()))
    }

    /// Notes contained in a folder.
    pub fn get_folders_notes(&self, folder_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::FolderNotes(folder_id.to_string()))
    }

    pub fn create_folder(&self, title: &str, options: &FolderOptions) -> Result<HttpResponse> {
        let fields = FolderFields { title, options };
        self.query(Post, &Endpoint::Folders, &to_payload(&fields)?)
    }

    pub fn update_folder(&self, folder_id: &str, title: &str, options: &FolderOptions) -> Result<HttpResponse> {
        let fields = FolderFields { title, options };
        self.query(Put, &Endpoint::Folder(folder_id.to_string()), &to_payload(&fields)?)
    }

    pub fn rename_folder(&self, folder_id: &str, title: &str) -> Result<HttpResponse> {
        self.send(Put, Endpoint::Folder(folder_id.to_string()), json!({ "title": title }))
    }

    pub fn delete_folder(&self, folder_id: &str) -> Result<HttpResponse> {
        self.query(Delete, &Endpoint::Folder(folder_id.to_string()), &Payload::new())
    }

    // ---------------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------------

    pub fn get_tags(&self) -> Result<HttpResponse> {
        self.get(Endpoint::Tags)
    }

    pub fn get_tag(&self, tag_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::Tag(tag_id.to_string()))
    }

    pub fn create_tag(&self, title: &str) -> Result<HttpResponse> {
        self.send(Post, Endpoint::Tags, json!({ "title": title }))
    }

    pub fn update_tag(&self, tag_id: &str, title: &str) -> Result<HttpResponse> {
        self.send(Put, Endpoint::Tag(tag_id.to_string()), json!({ "title": title }))
    }

    pub fn delete_tag(&self, tag_id: &str) -> Result<HttpResponse> {
        self.query(Delete, &Endpoint::Tag(tag_id.to_string()), &Payload::new())
    }

    /// Notes carrying a tag.
    pub fn get_tags_notes(&self, tag_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::TagNotes(tag_id.to_string()))
    }

    /// Attach `tag_id` to `note_id`.
    pub fn create_tags_notes(&self, note_id: &str, tag_id: &str) -> Result<HttpResponse> {
        self.send(Post, Endpoint::TagNotes(tag_id.to_string()), json!({ "id": note_id }))
    }

    /// Detach `tag_id` from `note_id`.
    pub fn delete_tags_notes(&self, tag_id: &str, note_id: &str) -> Result<HttpResponse> {
        let endpoint = Endpoint::TagNote {
            tag_id: tag_id.to_string(),
            note_id: note_id.to_string(),
        };
        self.query(Delete, &endpoint, &Payload::new())
    }

    // ---------------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------------

    pub fn get_resources(&self) -> Result<HttpResponse> {
        self.get(Endpoint::Resources)
    }

    pub fn get_resource(&self, resource_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::Resource(resource_id.to_string()))
    }

    /// Upload `data` as a new resource named `file_name`.
    pub fn create_resource(&self, file_name: &str, data: &[u8], options: &ResourceOptions) -> Result<HttpResponse> {
        self.upload(file_name, data, &to_payload(options)?)
    }

    pub fn update_resource(&self, resource_id: &str, options: &ResourceOptions) -> Result<HttpResponse> {
        self.query(Put, &Endpoint::Resource(resource_id.to_string()), &to_payload(options)?)
    }

    /// Raw file content of a resource.
    pub fn download_resource(&self, resource_id: &str) -> Result<HttpResponse> {
        self.get(Endpoint::ResourceFile(resource_id.to_string()))
    }

    pub fn delete_resource(&self, resource_id: &str) -> Result<HttpResponse> {
        self.query(Delete, &Endpoint::Resource(resource_id.to_string()), &Payload::new())
    }

    // ---------------------------------------------------------------------
    // Service
    // ---------------------------------------------------------------------

    pub fn version(&self) -> Result<HttpResponse> {
        self.get(Endpoint::Version)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ApiError;
    use crate::testing::RecordingTransport;

    const BASE: &str = "http://127.0.0.1:41184";

    fn client() -> JoplinApi<RecordingTransport> {
        JoplinApi::with_transport(ClientConfig::new("tok"), RecordingTransport::ok("{}")).unwrap()
    }

    fn last_body(c: &JoplinApi<RecordingTransport>) -> Value {
        let req = c.transport().requests().pop().unwrap();
        serde_json::from_slice(req.body.as_deref().unwrap()).unwrap()
    }

    fn last_line(c: &JoplinApi<RecordingTransport>) -> String {
        let req = c.transport().requests().pop().unwrap();
        format!("{} {}", req.method, req.url)
    }

    #[test]
    fn read_endpoints_map_to_paths() {
        let c = client();
        let check = |path: &str| assert_eq!(last_line(&c), format!("GET {BASE}/{path}?token=tok"));

        c.get_notes().unwrap();
        check("notes/");
        c.get_note("n1").unwrap();
        check("notes/n1");
        c.get_notes_tags("n1").unwrap();
        check("notes/n1/tags");
        c.get_folders().unwrap();
        check("folders/");
        c.get_folder("f1").unwrap();
        check("folders/f1");
        c.get_folders_notes("f1").unwrap();
        check("folders/f1/notes");
        c.get_tags().unwrap();
        check("tags/");
        c.get_tag("t1").unwrap();
        check("tags/t1");
        c.get_tags_notes("t1").unwrap();
        check("tags/t1/notes");
        c.get_resources().unwrap();
        check("resources/");
        c.get_resource("r1").unwrap();
        check("resources/r1");
        c.download_resource("r1").unwrap();
        check("resources/r1/file");
        c.version().unwrap();
        check("version/");
    }

    #[test]
    fn delete_endpoints_map_to_paths() {
        let c = client();
        c.delete_note("n1").unwrap();
        assert_eq!(last_line(&c), format!("DELETE {BASE}/notes/n1?token=tok"));
        c.delete_folder("f1").unwrap();
        assert_eq!(last_line(&c), format!("DELETE {BASE}/folders/f1?token=tok"));
        c.delete_tag("t1").unwrap();
        assert_eq!(last_line(&c), format!("DELETE {BASE}/tags/t1?token=tok"));
        c.delete_tags_notes("t1", "n1").unwrap();
        assert_eq!(last_line(&c), format!("DELETE {BASE}/tags/t1/notes/n1?token=tok"));
        c.delete_resource("r1").unwrap();
        assert_eq!(last_line(&c), format!("DELETE {BASE}/resources/r1?token=tok"));
    }

    #[test]
    fn create_note_sends_all_fields_with_defaults() {
        let c = client();
        c.create_note("Title", "# Body", "f1", &NoteOptions::default()).unwrap();
        assert_eq!(last_line(&c), format!("POST {BASE}/notes/?token=tok"));
        assert_eq!(
            last_body(&c),
            json!({
                "title": "Title",
                "body": "# Body",
                "parent_id": "f1",
                "author": "",
                "source_url": "",
                "tags": "",
                "is_todo": 0
            })
        );
    }

    #[test]
    fn update_note_targets_the_note() {
        let c = client();
        let options = NoteOptions::default().author("me").tags("a, b").todo(true);
        c.update_note("n1", "T", "B", "f1", &options).unwrap();
        assert_eq!(last_line(&c), format!("PUT {BASE}/notes/n1?token=tok"));
        let body = last_body(&c);
        assert_eq!(body["author"], "me");
        assert_eq!(body["tags"], "a, b");
        assert_eq!(body["is_todo"], 1);
    }

    #[test]
    fn move_and_rename_send_single_fields() {
        let c = client();
        c.move_note("n1", "f2").unwrap();
        assert_eq!(last_body(&c), json!({"parent_id": "f2"}));
        c.rename_note("n1", "New").unwrap();
        assert_eq!(last_body(&c), json!({"title": "New"}));
        c.rename_folder("f1", "Renamed").unwrap();
        assert_eq!(last_line(&c), format!("PUT {BASE}/folders/f1?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "Renamed"}));
    }

    #[test]
    fn folder_payloads() {
        let c = client();
        c.create_folder("Inbox", &FolderOptions::default()).unwrap();
        assert_eq!(last_line(&c), format!("POST {BASE}/folders/?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "Inbox", "parent_id": ""}));

        c.update_folder("f1", "Sub", &FolderOptions::parent("f0")).unwrap();
        assert_eq!(last_line(&c), format!("PUT {BASE}/folders/f1?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "Sub", "parent_id": "f0"}));
    }

    #[test]
    fn tag_payloads() {
        let c = client();
        c.create_tag("rust").unwrap();
        assert_eq!(last_line(&c), format!("POST {BASE}/tags/?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "rust"}));

        c.update_tag("t1", "rustlang").unwrap();
        assert_eq!(last_line(&c), format!("PUT {BASE}/tags/t1?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "rustlang"}));

        c.create_tags_notes("n1", "t1").unwrap();
        assert_eq!(last_line(&c), format!("POST {BASE}/tags/t1/notes?token=tok"));
        assert_eq!(last_body(&c), json!({"id": "n1"}));
    }

    #[test]
    fn resource_payloads() {
        let c = client();
        c.update_resource("r1", &ResourceOptions::titled("cactus")).unwrap();
        assert_eq!(last_line(&c), format!("PUT {BASE}/resources/r1?token=tok"));
        assert_eq!(last_body(&c), json!({"title": "cactus"}));

        c.create_resource("cactus.png", b"img", &ResourceOptions::titled("cactus")).unwrap();
        let req = c.transport().requests().pop().unwrap();
        assert_eq!(req.url, format!("{BASE}/resources/?token=tok"));
        assert!(req.header("content-type").unwrap().starts_with("multipart/form-data"));
    }

    #[test]
    fn empty_and_dot_ids_send_nothing() {
        let c = client();
        let attempts = [
            c.get_note(""),
            c.get_note(".."),
            c.get_notes_tags(".."),
            c.delete_folder(""),
            c.get_folders_notes("."),
            c.delete_tags_notes("..", ".."),
            c.create_tags_notes("n1", ""),
            c.update_resource("%2e%2e", &ResourceOptions::default()),
            c.download_resource(""),
        ];
        for (i, result) in attempts.into_iter().enumerate() {
            assert!(matches!(result, Err(ApiError::InvalidArgument(_))), "attempt {i}");
        }
        assert_eq!(c.transport().calls(), 0);
    }
}
