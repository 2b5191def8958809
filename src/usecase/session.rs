use crate::usecase::contracts::{
    AuthContext, LiveChannel, LiveEvent, NotificationTransport, Subscription, UserIdentity,
};
use crate::usecase::error::NotificationError;
use crate::usecase::notifications::{FetchOutcome, NotificationStore};

/// Notification state scoped to one authenticated session.
///
/// Created with [`NotificationSession::init`] once the user has signed in and
/// closed with [`NotificationSession::teardown`] on logout. Consumers receive
/// the store from the session instead of reaching for a global.
pub struct NotificationSession<T, A>
where
    T: NotificationTransport + 'static,
    A: AuthContext + 'static,
{
    user: UserIdentity,
    store: NotificationStore<T, A>,
    subscription: Option<Subscription>,
}

impl<T, A> NotificationSession<T, A>
where
    T: NotificationTransport + 'static,
    A: AuthContext + 'static,
{
    /// Loads the first page and starts forwarding live events into the store.
    /// Channel failures land in the store's error and a rejected session is
    /// escalated to `auth`.
    ///
    /// Fails with [`NotificationError::Auth`] when nobody is signed in or the
    /// backend rejects the session. Any other load or channel failure is
    /// recorded on the store and the session still opens.
    #[tracing::instrument(skip_all)]
    pub async fn init<C>(
        auth: A,
        transport: T,
        channel: &C,
        page_size: u32,
    ) -> Result<Self, NotificationError>
    where
        C: LiveChannel + ?Sized,
    {
        let user = auth.current_user().ok_or_else(|| {
            tracing::warn!("no signed-in user, refusing to open notification session");
            NotificationError::Auth
        })?;
        tracing::info!(user_id = %user.user_id, "opening notification session");

        let store = NotificationStore::new(transport, auth, page_size);
        if let FetchOutcome::Failed(NotificationError::Auth) = store.refresh().await {
            return Err(NotificationError::Auth);
        }

        let forward = store.clone();
        let subscription = match channel.subscribe(Box::new(move |event| match event {
            LiveEvent::Created(notification) => {
                forward.apply_live_event(notification);
            }
            LiveEvent::Failed(error) => forward.record_channel_error(error),
        })) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!(error = %e, "live updates unavailable for this session");
                if store.error().is_none() {
                    store.record_error(e);
                }
                None
            }
        };

        Ok(Self {
            user,
            store,
            subscription,
        })
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn store(&self) -> &NotificationStore<T, A> {
        &self.store
    }

    pub fn is_live(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    #[tracing::instrument(skip_all, fields(user_id = %self.user.user_id))]
    pub fn teardown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.store.close();
        tracing::info!("notification session closed");
    }
}
