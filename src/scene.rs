//! Emitter pose source.
//!
//! The emitter only needs to read a world position and forward vector and to
//! hear about changes. [`SceneNode`] is a minimal provider for hosts without a
//! scene graph of their own.

use crate::math::{Pose, Quat, Vec3};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// What part of a transform changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformChange {
    Position,
    Rotation,
    Scale,
}

/// Registration handle returned by [`PoseProvider::subscribe`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

pub type PoseHandler = Box<dyn FnMut(TransformChange) + Send + 'static>;

/// World transform of the object a sound is attached to.
pub trait PoseProvider: Send {
    fn position(&self) -> Vec3;

    fn forward(&self) -> Vec3;

    /// Register `handler` for change notifications. Handlers run synchronously
    /// on the thread that changed the transform.
    fn subscribe(&mut self, handler: PoseHandler) -> SubscriptionId;

    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Shared, observable transform. Clones refer to the same node.
///
/// Handlers are invoked while the node is locked and must not call back into
/// the node.
#[derive(Clone)]
pub struct SceneNode {
    inner: Arc<Mutex<SceneNodeInner>>,
}

#[derive(Default)]
struct SceneNodeInner {
    pose: Pose,
    scale: Vec3,
    handlers: HashMap<SubscriptionId, PoseHandler>,
    next_subscription: u64,
}

impl SceneNode {
    pub fn new(pose: Pose) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SceneNodeInner {
                pose,
                scale: Vec3::ONE,
                ..Default::default()
            })),
        }
    }

    pub fn pose(&self) -> Pose {
        self.inner.lock().pose
    }

    pub fn scale(&self) -> Vec3 {
        self.inner.lock().scale
    }

    pub fn set_position(&self, position: Vec3) {
        let mut inner = self.inner.lock();
        if inner.pose.position == position {
            return;
        }
        inner.pose.position = position;
        inner.notify(TransformChange::Position);
    }

    pub fn set_rotation(&self, rotation: Quat) {
        let mut inner = self.inner.lock();
        if inner.pose.rotation == rotation {
            return;
        }
        inner.pose.rotation = rotation;
        inner.notify(TransformChange::Rotation);
    }

    pub fn set_pose(&self, pose: Pose) {
        let mut inner = self.inner.lock();
        let moved = inner.pose.position != pose.position;
        let turned = inner.pose.rotation != pose.rotation;
        inner.pose = pose;
        if moved {
            inner.notify(TransformChange::Position);
        }
        if turned {
            inner.notify(TransformChange::Rotation);
        }
    }

    pub fn set_scale(&self, scale: Vec3) {
        let mut inner = self.inner.lock();
        if inner.scale == scale {
            return;
        }
        inner.scale = scale;
        inner.notify(TransformChange::Scale);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().handlers.len()
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new(Pose::identity())
    }
}

impl SceneNodeInner {
    fn notify(&mut self, change: TransformChange) {
        for handler in self.handlers.values_mut() {
            handler(change);
        }
    }
}

impl PoseProvider for SceneNode {
    fn position(&self) -> Vec3 {
        self.inner.lock().pose.position
    }

    fn forward(&self) -> Vec3 {
        self.inner.lock().pose.forward()
    }

    fn subscribe(&mut self, handler: PoseHandler) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.handlers.insert(id, handler);
        log::debug!("SceneNode: registered {}", id);
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if self.inner.lock().handlers.remove(&id).is_some() {
            log::debug!("SceneNode: released {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifies_each_change_kind() {
        let mut node = SceneNode::new(Pose::identity());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = node.subscribe(Box::new(move |change| sink.lock().push(change)));

        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        node.set_rotation(Quat::from_rotation_y(1.0));
        node.set_scale(Vec3::splat(2.0));

        assert_eq!(
            *seen.lock(),
            vec![
                TransformChange::Position,
                TransformChange::Rotation,
                TransformChange::Scale
            ]
        );
        assert_eq!(node.position(), Vec3::new(1.0, 2.0, 3.0));

        node.unsubscribe(id);
        assert_eq!(node.subscriber_count(), 0);
        node.set_position(Vec3::ZERO);
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_set_pose_reports_both_changes() {
        let mut node = SceneNode::new(Pose::identity());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        node.subscribe(Box::new(move |change| sink.lock().push(change)));

        node.set_pose(Pose::new(Vec3::X, Quat::from_rotation_x(0.5)));
        assert_eq!(
            *seen.lock(),
            vec![TransformChange::Position, TransformChange::Rotation]
        );
    }
}
