use std::collections::HashMap;
use std::time::{Duration, Instant};
use subpulse_core::{Classification, PushEvent};
use tracing::debug;

/// 拖拽关闭的距离阈值（逻辑像素），达到即立刻关闭
pub const SWIPE_DISMISS_PX: f32 = 120.0;

/// 弹窗默认存活时长
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// 弹窗关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    TimedOut,
    Closed,
    Swiped,
}

/// 弹窗附带的可选动作；触发时先关闭弹窗再执行回调
pub struct ToastAction {
    pub label: String,
    callback: Box<dyn FnOnce() + Send>,
}

impl ToastAction {
    pub fn new(label: &str, callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label: label.to_string(),
            callback: Box::new(callback),
        }
    }
}

/// 当前可见的一条弹窗
pub struct Surface {
    pub id: u64,
    /// 创建序即层叠序：值越大越靠上，折叠重绘不改变层级
    pub z_index: u64,
    pub classification: Classification,
    pub title: String,
    pub message: String,
    pub count: u32,
    pub deadline: Instant,
    key: String,
    action: Option<ToastAction>,
}

impl Surface {
    pub fn action_label(&self) -> Option<&str> {
        self.action.as_ref().map(|a| a.label.as_str())
    }
}

struct DedupEntry {
    count: u32,
    surface_id: u64,
}

/// 去重表：按去重键折叠重复弹窗。
/// register / increment / evict 是仅有的三个变更入口。
#[derive(Default)]
pub struct DedupTable {
    entries: HashMap<String, DedupEntry>,
}

impl DedupTable {
    /// 首次出现时登记，计数从 1 开始
    pub fn register(&mut self, key: String, surface_id: u64) {
        self.entries.insert(key, DedupEntry { count: 1, surface_id });
    }

    /// 重复出现时递增计数，返回新计数
    pub fn increment(&mut self, key: &str) -> Option<u32> {
        let entry = self.entries.get_mut(key)?;
        entry.count += 1;
        Some(entry.count)
    }

    /// 弹窗关闭时清除登记，之后同键事件重新从 1 计数
    pub fn evict(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn surface_for(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.surface_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 入栈结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastUpdate {
    /// 新建弹窗
    Created(u64),
    /// 折叠进已有弹窗，计数徽标更新
    Folded { id: u64, count: u32 },
}

/// 弹窗栈：推送事件的单一消费者，按到达顺序处理
pub struct ToastStack {
    dedup: DedupTable,
    surfaces: Vec<Surface>,
    next_id: u64,
    ttl: Duration,
}

impl Default for ToastStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastStack {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            dedup: DedupTable::default(),
            surfaces: Vec::new(),
            next_id: 0,
            ttl,
        }
    }

    pub fn push(&mut self, event: PushEvent, now: Instant) -> ToastUpdate {
        self.push_with_action(event, now, None)
    }

    /// 同键且弹窗仍可见：原地重绘并重置计时器；否则新建弹窗
    pub fn push_with_action(
        &mut self,
        event: PushEvent,
        now: Instant,
        action: Option<ToastAction>,
    ) -> ToastUpdate {
        let key = event.dedupe_key();

        if let Some(surface_id) = self.dedup.surface_for(&key) {
            let count = self.dedup.increment(&key).unwrap_or(1);
            if let Some(surface) = self.surfaces.iter_mut().find(|s| s.id == surface_id) {
                surface.count = count;
                surface.deadline = now + self.ttl;
            }
            return ToastUpdate::Folded { id: surface_id, count };
        }

        let id = self.next_id;
        self.next_id += 1;
        self.dedup.register(key.clone(), id);
        self.surfaces.push(Surface {
            id,
            z_index: id,
            classification: event.classification,
            title: event.title,
            message: event.message,
            count: 1,
            deadline: now + self.ttl,
            key,
            action,
        });
        ToastUpdate::Created(id)
    }

    /// 关闭弹窗并清除其去重登记
    pub fn dismiss(&mut self, id: u64, reason: DismissReason) -> Option<Surface> {
        let pos = self.surfaces.iter().position(|s| s.id == id)?;
        let surface = self.surfaces.remove(pos);
        self.dedup.evict(&surface.key);
        debug!(surface = id, ?reason, "toast dismissed");
        Some(surface)
    }

    /// 拖拽松手：位移达到阈值立刻关闭，否则回弹
    pub fn release_drag(&mut self, id: u64, offset: f32) -> bool {
        if offset.abs() >= SWIPE_DISMISS_PX {
            self.dismiss(id, DismissReason::Swiped).is_some()
        } else {
            false
        }
    }

    /// 关闭所有到期弹窗，返回被关闭的 id
    pub fn sweep(&mut self, now: Instant) -> Vec<u64> {
        let due: Vec<u64> = self
            .surfaces
            .iter()
            .filter(|s| s.deadline <= now)
            .map(|s| s.id)
            .collect();
        for id in &due {
            self.dismiss(*id, DismissReason::TimedOut);
        }
        due
    }

    /// 触发弹窗动作：先关闭，再回调
    pub fn invoke_action(&mut self, id: u64) -> bool {
        match self.dismiss(id, DismissReason::Closed) {
            Some(mut surface) => {
                if let Some(action) = surface.action.take() {
                    (action.callback)();
                }
                true
            }
            None => false,
        }
    }

    /// 可见弹窗，自底向上（创建序）；渲染时后者压在前者之上
    pub fn visible(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn get(&self, id: u64) -> Option<&Surface> {
        self.surfaces.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}
