// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Controller runtime wiring.
//!
//! The four switchboard kinds each run a [`Controller`] whose reconcile
//! function hands the object key to [`reconcile_request`]. `Service` and
//! `Node` are only watched: both their updates and their disappearance have
//! to reach the reconciler, and a controller skips objects that are no longer
//! in its cache.

use crate::context::Context;
use crate::reconcilers::{reconcile_request, Outcome, Reconcile};
use crate::store::{KubeStore, ObjectKey, StoreObject};
use futures::{Stream, StreamExt};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{watcher, Controller, WatchStreamExt};
use kube::Resource;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Reconciler plus the context it runs against.
struct Runner<R> {
    reconciler: R,
    ctx: Arc<Context<KubeStore>>,
}

/// Map a reconcile outcome onto the runtime's scheduling action.
#[must_use]
pub fn action(outcome: Outcome, error_requeue: Duration) -> Action {
    match outcome {
        Outcome::Done => Action::await_change(),
        Outcome::Requeue => Action::requeue(error_requeue),
        Outcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

/// Translate explicit requeue keys into controller triggers.
pub fn triggers<K, S>(keys: S) -> impl Stream<Item = ObjectRef<K>> + Send + 'static
where
    K: Resource<DynamicType = ()> + 'static,
    S: Stream<Item = ObjectKey> + Send + 'static,
{
    keys.map(|key| {
        let oref = ObjectRef::<K>::new(&key.name);
        match &key.namespace {
            Some(ns) => oref.within(ns),
            None => oref,
        }
    })
}

async fn reconcile<R>(
    obj: Arc<R::Object>,
    runner: Arc<Runner<R>>,
) -> Result<Action, ReconcileError>
where
    R: Reconcile<KubeStore> + 'static,
{
    let key = ObjectKey::of(obj.as_ref());
    let outcome = reconcile_request(&runner.reconciler, &runner.ctx, &key).await;
    Ok(action(outcome, runner.ctx.settings.error_requeue))
}

fn error_policy<R>(obj: Arc<R::Object>, err: &ReconcileError, runner: Arc<Runner<R>>) -> Action
where
    R: Reconcile<KubeStore> + 'static,
{
    warn!("Reconcile of {} failed: {}", ObjectKey::of(obj.as_ref()), err);
    Action::requeue(runner.ctx.settings.error_requeue)
}

/// Drive `controller` with `reconciler` until shutdown.
pub async fn run_controller<R>(
    controller: Controller<R::Object>,
    reconciler: R,
    ctx: Arc<Context<KubeStore>>,
) where
    R: Reconcile<KubeStore> + 'static,
{
    let kind = <R::Object as Resource>::kind(&()).to_string();
    info!("Starting {} controller", kind);

    controller
        .shutdown_on_signal()
        .run(
            reconcile::<R>,
            error_policy::<R>,
            Arc::new(Runner { reconciler, ctx }),
        )
        .for_each(|result| {
            match result {
                Ok((obj, _)) => debug!("Reconciled {} {}", kind, obj),
                Err(e) => debug!("{} controller event: {}", kind, e),
            }
            futures::future::ready(())
        })
        .await;

    info!("{} controller stopped", kind);
}

/// Feed every watch event of `R::Object` to `reconciler`, deletions included.
pub async fn run_watch<R>(reconciler: R, ctx: Arc<Context<KubeStore>>)
where
    R: Reconcile<KubeStore> + 'static,
{
    let kind = <R::Object as Resource>::kind(&()).to_string();
    info!("Starting {} watch", kind);

    let api = <R::Object as StoreObject>::api(ctx.store.client().clone(), None);
    let mut events = pin!(watcher(api, watcher::Config::default()).default_backoff());
    while let Some(event) = events.next().await {
        let obj = match event {
            Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => obj,
            Ok(watcher::Event::Delete(obj)) => obj,
            Ok(watcher::Event::Init | watcher::Event::InitDone) => continue,
            Err(e) => {
                warn!("{} watch failed: {}", kind, e);
                continue;
            }
        };
        reconcile_request(&reconciler, &ctx, &ObjectKey::of(&obj)).await;
    }

    info!("{} watch stopped", kind);
}

#[cfg(test)]
#[path = "controllers_tests.rs"]
mod controllers_tests;
