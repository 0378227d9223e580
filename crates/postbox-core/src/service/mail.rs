//! The in-process mailbox API.

use tracing::debug;

use crate::attachment::{Attachment, AttachmentId, AttachmentRepository};
use crate::folder::{FolderId, FolderRepository, FolderSummary};
use crate::mailbox::{MailboxRepository, MailboxStats, MessageView, Role};
use crate::message::{Message, MessageId, MessageRepository, Priority};
use crate::store::MailStore;
use crate::user::{User, UserId, UserRepository};
use crate::{Error, Result};

/// Facade over the mailbox core, exposing every operation a
/// presentation layer needs as plain in-process calls.
pub struct MailboxService {
    users: UserRepository,
    folders: FolderRepository,
    messages: MessageRepository,
    mailbox: MailboxRepository,
    attachments: AttachmentRepository,
}

impl MailboxService {
    /// Build the service over an opened store.
    #[must_use]
    pub fn new(store: &MailStore) -> Self {
        Self {
            users: UserRepository::new(store.pool()),
            folders: FolderRepository::new(store.pool()),
            messages: MessageRepository::new(store.pool()),
            mailbox: MailboxRepository::new(store.pool()),
            attachments: AttachmentRepository::new(store.pool()),
        }
    }

    // --- accounts ---

    /// Register a new user; their system folders are created before
    /// this returns.
    ///
    /// # Errors
    ///
    /// See [`UserRepository::create`].
    pub async fn sign_up(&self, name: &str, password_hash: &str) -> Result<User> {
        self.users.create(name, password_hash).await
    }

    /// Check credentials and record the login time on success.
    ///
    /// # Errors
    ///
    /// Returns an error if a database call fails.
    pub async fn log_in(&self, name: &str, password_hash: &str) -> Result<Option<User>> {
        let Some(user) = self.users.verify_credentials(name, password_hash).await? else {
            return Ok(None);
        };
        self.users.touch_last_login(user.id).await?;
        Ok(Some(user))
    }

    /// Soft-deactivate an account; its mail stays in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user does not exist, or a
    /// database error.
    pub async fn deactivate(&self, user_id: UserId) -> Result<()> {
        self.users.deactivate(user_id).await
    }

    // --- sending ---

    /// Send a message to a named recipient.
    ///
    /// The recipient is resolved and the business rules checked before
    /// any transaction opens; a doomed send never touches the store.
    /// On success exactly two mailbox entries exist for the returned
    /// message, one per party, each independently mutable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecipientNotFound`] for an unknown name,
    /// [`Error::SelfSendNotAllowed`] when sending to oneself,
    /// [`Error::Validation`] for a blank subject or body, or a delivery
    /// error from [`MailboxRepository::deliver`].
    pub async fn send(
        &self,
        author: UserId,
        recipient_name: &str,
        subject: &str,
        body: &str,
        priority: Priority,
    ) -> Result<MessageId> {
        let recipient_name = recipient_name.trim();
        let recipient = self
            .users
            .resolve(recipient_name)
            .await?
            .ok_or_else(|| Error::RecipientNotFound(recipient_name.to_string()))?;

        if recipient == author {
            return Err(Error::SelfSendNotAllowed);
        }
        if subject.trim().is_empty() {
            return Err(Error::Validation("subject must not be blank".to_string()));
        }
        if body.trim().is_empty() {
            return Err(Error::Validation("body must not be blank".to_string()));
        }

        let id = self
            .mailbox
            .deliver(author, recipient, subject, body, priority)
            .await?;
        debug!("user {} sent message {} to {recipient_name}", author.0, id.0);
        Ok(id)
    }

    // --- entry state ---

    /// Mark a received message as read. Idempotent; returns whether the
    /// flag actually changed.
    ///
    /// # Errors
    ///
    /// See [`MailboxRepository::mark_read`].
    pub async fn mark_read(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        self.mailbox.mark_read(message_id, user_id).await
    }

    /// Flip the star on the caller's copy; returns the new value.
    ///
    /// # Errors
    ///
    /// See [`MailboxRepository::toggle_star`].
    pub async fn toggle_star(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        self.mailbox.toggle_star(message_id, user_id).await
    }

    /// Soft-delete the caller's copy; returns whether the flag actually
    /// changed.
    ///
    /// # Errors
    ///
    /// See [`MailboxRepository::soft_delete`].
    pub async fn soft_delete(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        self.mailbox.soft_delete(message_id, user_id).await
    }

    /// Re-file the caller's copy under one of their own folders.
    ///
    /// # Errors
    ///
    /// See [`MailboxRepository::move_to_folder`].
    pub async fn move_to_folder(
        &self,
        message_id: MessageId,
        user_id: UserId,
        folder_id: FolderId,
    ) -> Result<()> {
        self.mailbox.move_to_folder(message_id, user_id, folder_id).await
    }

    // --- folders ---

    /// Create a custom folder.
    ///
    /// # Errors
    ///
    /// See [`FolderRepository::create_folder`].
    pub async fn create_folder(
        &self,
        user_id: UserId,
        name: &str,
        parent_id: Option<FolderId>,
        color: Option<&str>,
    ) -> Result<FolderId> {
        self.folders.create_folder(user_id, name, parent_id, color).await
    }

    /// List the caller's folders with live counts.
    ///
    /// # Errors
    ///
    /// See [`FolderRepository::list_folders`].
    pub async fn list_folders(&self, user_id: UserId) -> Result<Vec<FolderSummary>> {
        self.folders.list_folders(user_id).await
    }

    /// Delete a custom folder; referencing mail is unfiled, never
    /// deleted.
    ///
    /// # Errors
    ///
    /// See [`FolderRepository::delete_folder`].
    pub async fn delete_folder(&self, folder_id: FolderId, user_id: UserId) -> Result<()> {
        self.folders.delete_folder(folder_id, user_id).await
    }

    /// Rename a custom folder.
    ///
    /// # Errors
    ///
    /// See [`FolderRepository::rename_folder`].
    pub async fn rename_folder(
        &self,
        folder_id: FolderId,
        user_id: UserId,
        new_name: &str,
    ) -> Result<()> {
        self.folders.rename_folder(folder_id, user_id, new_name).await
    }

    // --- reading ---

    /// List received mail, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_inbox(&self, user_id: UserId) -> Result<Vec<MessageView>> {
        self.mailbox.list_inbox(user_id).await
    }

    /// List sent mail, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_sent(&self, user_id: UserId) -> Result<Vec<MessageView>> {
        self.mailbox.list_sent(user_id).await
    }

    /// List the caller's active mail in one folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_folder(
        &self,
        user_id: UserId,
        folder_id: FolderId,
    ) -> Result<Vec<MessageView>> {
        self.mailbox.list_by_folder(user_id, folder_id).await
    }

    /// Substring search over the caller's active mail.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search(
        &self,
        user_id: UserId,
        term: &str,
        role: Option<Role>,
    ) -> Result<Vec<MessageView>> {
        self.mailbox.search(user_id, term, role).await
    }

    /// Aggregate mailbox counts from one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn compute_stats(&self, user_id: UserId) -> Result<MailboxStats> {
        self.mailbox.compute_stats(user_id).await
    }

    /// Fetch one stored message by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch_message(&self, message_id: MessageId) -> Result<Option<Message>> {
        self.messages.fetch(message_id).await
    }

    // --- attachments ---

    /// Record attachment metadata against a message.
    ///
    /// # Errors
    ///
    /// See [`AttachmentRepository::record`].
    pub async fn record_attachment(
        &self,
        message_id: MessageId,
        file_name: &str,
        file_size: u64,
        mime_type: &str,
        file_path: &str,
    ) -> Result<AttachmentId> {
        self.attachments
            .record(message_id, file_name, file_size, mime_type, file_path)
            .await
    }

    /// List attachment metadata for a message.
    ///
    /// # Errors
    ///
    /// See [`AttachmentRepository::list_for_message`].
    pub async fn list_attachments(&self, message_id: MessageId) -> Result<Vec<Attachment>> {
        self.attachments.list_for_message(message_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn service() -> (MailStore, MailboxService) {
        let store = MailStore::in_memory().await.unwrap();
        let service = MailboxService::new(&store);
        (store, service)
    }

    #[tokio::test]
    async fn test_send_scenario() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();
        let bob = svc.sign_up("bob", "hash-b").await.unwrap();

        let id = svc
            .send(alice.id, "bob", "Hi", "there", Priority::Normal)
            .await
            .unwrap();

        let sent = svc.list_sent(alice.id).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_id, id);
        assert_eq!(sent[0].receiver_name.as_deref(), Some("bob"));

        let inbox = svc.list_inbox(bob.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_name.as_deref(), Some("alice"));
        assert!(!inbox[0].read);

        let message = svc.fetch_message(id).await.unwrap().unwrap();
        assert_eq!(message.subject, "Hi");
    }

    #[tokio::test]
    async fn test_send_to_unknown_recipient_leaves_no_rows() {
        let (store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();

        let err = svc
            .send(alice.id, "nobody", "Hi", "there", Priority::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecipientNotFound(name) if name == "nobody"));

        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mailbox_entries")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(messages, 0);
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_send_to_self_rejected() {
        let (store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();

        let err = svc
            .send(alice.id, "alice", "Hi", "me", Priority::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelfSendNotAllowed));

        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(messages, 0);
    }

    #[tokio::test]
    async fn test_send_blank_subject_or_body_rejected() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();
        svc.sign_up("bob", "hash-b").await.unwrap();

        let err = svc
            .send(alice.id, "bob", "   ", "there", Priority::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = svc
            .send(alice.id, "bob", "Hi", "", Priority::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_folder_unfiles_mail_but_keeps_it() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();
        let bob = svc.sign_up("bob", "hash-b").await.unwrap();

        let folder = svc
            .create_folder(bob.id, "Projects", None, None)
            .await
            .unwrap();
        for subject in ["One", "Two", "Three"] {
            let id = svc
                .send(alice.id, "bob", subject, "body", Priority::Normal)
                .await
                .unwrap();
            svc.move_to_folder(id, bob.id, folder).await.unwrap();
        }
        assert_eq!(svc.list_by_folder(bob.id, folder).await.unwrap().len(), 3);
        let before = svc.compute_stats(bob.id).await.unwrap();

        svc.delete_folder(folder, bob.id).await.unwrap();

        assert!(svc.list_by_folder(bob.id, folder).await.unwrap().is_empty());
        let after = svc.compute_stats(bob.id).await.unwrap();
        assert_eq!(before.total, after.total);

        // The mail is merely unfiled, still visible in the inbox.
        assert_eq!(svc.list_inbox(bob.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();

        let logged_in = svc.log_in("alice", "hash-a").await.unwrap().unwrap();
        assert_eq!(logged_in.id, alice.id);
        assert!(svc.log_in("alice", "wrong").await.unwrap().is_none());

        svc.deactivate(alice.id).await.unwrap();
        assert!(svc.log_in("alice", "hash-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_folder_counts_track_mail_state() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();
        let bob = svc.sign_up("bob", "hash-b").await.unwrap();

        let first = svc
            .send(alice.id, "bob", "One", "body", Priority::Normal)
            .await
            .unwrap();
        svc.send(alice.id, "bob", "Two", "body", Priority::Normal)
            .await
            .unwrap();
        svc.mark_read(first, bob.id).await.unwrap();

        let inbox = svc
            .list_folders(bob.id)
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.folder.name == "Inbox")
            .unwrap();
        assert_eq!(inbox.email_count, 2);
        assert_eq!(inbox.unread_count, 1);
    }

    #[tokio::test]
    async fn test_attachment_metadata_round_trip() {
        let (_store, svc) = service().await;
        let alice = svc.sign_up("alice", "hash-a").await.unwrap();
        svc.sign_up("bob", "hash-b").await.unwrap();

        let id = svc
            .send(alice.id, "bob", "Hi", "see attached", Priority::Normal)
            .await
            .unwrap();
        svc.record_attachment(id, "report.pdf", 2048, "application/pdf", "blobs/ab/cd")
            .await
            .unwrap();

        let listed = svc.list_attachments(id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mime_type, "application/pdf");
    }
}
