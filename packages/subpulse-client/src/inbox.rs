use std::collections::BTreeSet;
use subpulse_core::{AppConfig, Notification, NotificationStatus};
use subpulse_sdk::{NotificationBackend, SdkResult};
use tracing::info;

/// 已读状态筛选
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl StatusFilter {
    fn matches(&self, status: NotificationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Unread => status == NotificationStatus::Unread,
            StatusFilter::Read => status == NotificationStatus::Read,
        }
    }
}

/// 浏览 / 多选两态状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboxMode {
    #[default]
    Browsing,
    Selecting,
}

/// 收件箱控制器：持有服务端快照，派生筛选分页视图，下发批量操作。
/// 本地从不直接改写通知，所有变更走后端调用后整体刷新。
pub struct InboxController<B: NotificationBackend> {
    backend: B,
    user_id: i64,
    page_size: usize,
    items: Vec<Notification>,
    search: String,
    filter: StatusFilter,
    page: usize,
    mode: InboxMode,
    selection: BTreeSet<i64>,
}

impl<B: NotificationBackend> InboxController<B> {
    pub fn new(backend: B, user_id: i64) -> Self {
        Self::with_page_size(backend, user_id, AppConfig::default().page_size)
    }

    pub fn with_page_size(backend: B, user_id: i64, page_size: usize) -> Self {
        Self {
            backend,
            user_id,
            page_size: page_size.max(1),
            items: Vec::new(),
            search: String::new(),
            filter: StatusFilter::All,
            page: 1,
            mode: InboxMode::Browsing,
            selection: BTreeSet::new(),
        }
    }

    /// 重新拉取权威状态；失败时本地状态保持不变
    pub async fn refresh(&mut self) -> SdkResult<()> {
        let items = self.backend.fetch_inbox(self.user_id).await?;
        info!(count = items.len(), "inbox refreshed");
        self.items = items;
        self.clamp_page();
        Ok(())
    }

    /// 筛选视图：标题+正文的大小写无关子串匹配，再按状态精确筛选
    pub fn filtered(&self) -> Vec<&Notification> {
        let needle = self.search.to_lowercase();
        self.items
            .iter()
            .filter(|n| {
                if !self.filter.matches(n.status) {
                    return false;
                }
                if needle.is_empty() {
                    return true;
                }
                n.title.to_lowercase().contains(&needle)
                    || n.message.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(self.page_size).max(1)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 当前页切片
    pub fn page_items(&self) -> Vec<&Notification> {
        self.filtered()
            .into_iter()
            .skip((self.page - 1) * self.page_size)
            .take(self.page_size)
            .collect()
    }

    /// 条目不足一页时整个分页控件隐藏
    pub fn pagination_visible(&self) -> bool {
        self.filtered().len() > self.page_size
    }

    /// 翻页；页码收敛到合法区间，页变化时清空选择
    pub fn set_page(&mut self, page: usize) {
        let target = page.clamp(1, self.total_pages());
        if target != self.page {
            self.page = target;
            self.selection.clear();
        }
    }

    pub fn set_search(&mut self, text: &str) {
        self.search = text.to_string();
        self.selection.clear();
        self.clamp_page();
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        self.filter = filter;
        self.selection.clear();
        self.clamp_page();
    }

    /// 重算后页码收敛而非重置：页面仍存在时用户停留在原页
    fn clamp_page(&mut self) {
        self.page = self.page.clamp(1, self.total_pages());
    }

    pub fn mode(&self) -> InboxMode {
        self.mode
    }

    pub fn selection(&self) -> &BTreeSet<i64> {
        &self.selection
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            InboxMode::Browsing => InboxMode::Selecting,
            InboxMode::Selecting => InboxMode::Browsing,
        };
        self.selection.clear();
    }

    /// 多选模式下点击条目切换选中；浏览模式下点击是导航，不在此处理
    pub fn toggle_select(&mut self, id: i64) {
        if self.mode != InboxMode::Selecting {
            return;
        }
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
    }

    /// 全选当前页：选择集恰好等于当前页可见 id；
    /// 已是该集合时再次调用清空（真正的开关，而非单调并集）
    pub fn toggle_select_page(&mut self) {
        if self.mode != InboxMode::Selecting {
            return;
        }
        let page_ids: BTreeSet<i64> = self.page_items().iter().map(|n| n.id).collect();
        if self.selection == page_ids {
            self.selection.clear();
        } else {
            self.selection = page_ids;
        }
    }

    /// 标记选中项已读；成功后刷新、清空选择并退出多选模式
    pub async fn mark_selected_read(&mut self) -> SdkResult<()> {
        if self.selection.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = self.selection.iter().copied().collect();
        self.backend.toggle_read(&ids, false).await?;
        self.selection.clear();
        self.mode = InboxMode::Browsing;
        self.refresh().await
    }

    /// 全部标记已读（头部动作，`all=true` 时服务端忽略 ids）
    pub async fn mark_all_read(&mut self) -> SdkResult<()> {
        self.backend.toggle_read(&[], true).await?;
        self.selection.clear();
        self.mode = InboxMode::Browsing;
        self.refresh().await
    }

    /// 删除单条；不需要确认，删除后停留在当前模式
    pub async fn delete_one(&mut self, id: i64) -> SdkResult<()> {
        self.backend.delete(&[id], false).await?;
        self.selection.clear();
        self.refresh().await
    }

    /// 删除选中项；不需要确认，不退出多选模式
    pub async fn delete_selected(&mut self) -> SdkResult<()> {
        if self.selection.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = self.selection.iter().copied().collect();
        self.backend.delete(&ids, false).await?;
        self.selection.clear();
        self.refresh().await
    }

    /// 全部删除：唯一需要确认的破坏性动作。
    /// 确认回调返回 false 时不发出请求，返回 Ok(false)。
    pub async fn delete_all<F>(&mut self, confirm: F) -> SdkResult<bool>
    where
        F: FnOnce() -> bool,
    {
        if !confirm() {
            return Ok(false);
        }
        self.backend.delete(&[], true).await?;
        self.selection.clear();
        self.refresh().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};
    use subpulse_core::MutationResponse;
    use subpulse_sdk::SdkError;

    /// 按线上语义工作的内存后端，记录每次调用的精确参数
    #[derive(Clone, Default)]
    struct MockBackend {
        items: Arc<Mutex<Vec<Notification>>>,
        calls: Arc<Mutex<Vec<(String, Vec<i64>, bool)>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl MockBackend {
        fn seeded(items: Vec<Notification>) -> Self {
            Self {
                items: Arc::new(Mutex::new(items)),
                ..Default::default()
            }
        }

        fn ok() -> MutationResponse {
            MutationResponse {
                message: "done".to_string(),
                status_code: 200,
            }
        }

        fn check_fail(&self) -> SdkResult<()> {
            if *self.fail.lock().unwrap() {
                return Err(SdkError::NetworkError("down".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl NotificationBackend for MockBackend {
        async fn fetch_inbox(&self, _user_id: i64) -> SdkResult<Vec<Notification>> {
            self.check_fail()?;
            Ok(self.items.lock().unwrap().clone())
        }

        async fn toggle_read(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
            self.check_fail()?;
            self.calls
                .lock()
                .unwrap()
                .push(("toggle_read".to_string(), ids.to_vec(), all));
            let mut items = self.items.lock().unwrap();
            for item in items.iter_mut() {
                // all=true 优先，ids 被忽略
                if all || ids.contains(&item.id) {
                    item.status = NotificationStatus::Read;
                }
            }
            Ok(Self::ok())
        }

        async fn delete(&self, ids: &[i64], all: bool) -> SdkResult<MutationResponse> {
            self.check_fail()?;
            self.calls
                .lock()
                .unwrap()
                .push(("delete".to_string(), ids.to_vec(), all));
            let mut items = self.items.lock().unwrap();
            if all {
                items.clear();
            } else {
                items.retain(|item| !ids.contains(&item.id));
            }
            Ok(Self::ok())
        }
    }

    fn notification(id: i64, title: &str, message: &str, status: NotificationStatus) -> Notification {
        Notification {
            id,
            title: title.to_string(),
            message: message.to_string(),
            status,
            created_at: Utc::now(),
        }
    }

    fn seeded(n: usize) -> Vec<Notification> {
        (1..=n as i64)
            .map(|id| notification(id, &format!("Title {id}"), "body", NotificationStatus::Unread))
            .collect()
    }

    async fn controller(items: Vec<Notification>, page_size: usize) -> InboxController<MockBackend> {
        let mut c = InboxController::with_page_size(MockBackend::seeded(items), 1, page_size);
        c.refresh().await.unwrap();
        c
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_over_title_and_message() {
        let mut c = controller(
            vec![
                notification(1, "Payment Failed", "card declined", NotificationStatus::Unread),
                notification(2, "Welcome", "PAYMENT trial started", NotificationStatus::Read),
                notification(3, "Digest", "weekly summary", NotificationStatus::Read),
            ],
            3,
        )
        .await;

        c.set_search("payment");
        let ids: Vec<i64> = c.filtered().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_status_filter_exact_match() {
        let mut c = controller(
            vec![
                notification(1, "a", "b", NotificationStatus::Unread),
                notification(2, "a", "b", NotificationStatus::Unread),
                notification(3, "a", "b", NotificationStatus::Read),
            ],
            3,
        )
        .await;

        c.set_filter(StatusFilter::Unread);
        let ids: Vec<i64> = c.filtered().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);

        c.set_filter(StatusFilter::Read);
        let ids: Vec<i64> = c.filtered().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn test_total_pages_formula() {
        let c = controller(seeded(7), 3).await;
        assert_eq!(c.total_pages(), 3);

        let c = controller(seeded(6), 3).await;
        assert_eq!(c.total_pages(), 2);

        let c = controller(Vec::new(), 3).await;
        // 空收件箱仍至少 1 页
        assert_eq!(c.total_pages(), 1);
        assert_eq!(c.page(), 1);
    }

    #[tokio::test]
    async fn test_page_clamped_not_reset_after_filter_change() {
        let mut c = controller(
            vec![
                notification(1, "a", "b", NotificationStatus::Unread),
                notification(2, "a", "b", NotificationStatus::Unread),
                notification(3, "a", "b", NotificationStatus::Unread),
                notification(4, "a", "b", NotificationStatus::Unread),
                notification(5, "a", "b", NotificationStatus::Read),
                notification(6, "a", "b", NotificationStatus::Unread),
                notification(7, "a", "b", NotificationStatus::Unread),
            ],
            3,
        )
        .await;

        c.set_page(3);
        assert_eq!(c.page(), 3);

        // 筛掉一条后还有 6 条 / 2 页：页码收敛到 2，而不是跳回 1
        c.set_filter(StatusFilter::Unread);
        assert_eq!(c.total_pages(), 2);
        assert_eq!(c.page(), 2);
    }

    #[tokio::test]
    async fn test_page_survives_delete_when_still_valid() {
        let mut c = controller(seeded(6), 3).await;
        c.set_page(2);

        c.delete_one(6).await.unwrap();

        // 剩 5 条仍是 2 页，用户停留在第 2 页
        assert_eq!(c.total_pages(), 2);
        assert_eq!(c.page(), 2);
    }

    #[tokio::test]
    async fn test_pagination_hidden_when_single_page() {
        let c = controller(seeded(3), 3).await;
        assert!(!c.pagination_visible());

        let c = controller(seeded(4), 3).await;
        assert!(c.pagination_visible());
    }

    #[tokio::test]
    async fn test_toggle_select_only_in_selecting_mode() {
        let mut c = controller(seeded(3), 3).await;

        c.toggle_select(1);
        assert!(c.selection().is_empty());

        c.toggle_mode();
        c.toggle_select(1);
        assert_eq!(c.selection().iter().copied().collect::<Vec<_>>(), vec![1]);

        c.toggle_select(1);
        assert!(c.selection().is_empty());
    }

    #[tokio::test]
    async fn test_select_page_is_exact_toggle() {
        let mut c = controller(seeded(5), 3).await;
        c.toggle_mode();

        c.toggle_select_page();
        assert_eq!(c.selection().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);

        // 再次调用回到空集，绝不是并集
        c.toggle_select_page();
        assert!(c.selection().is_empty());
    }

    #[tokio::test]
    async fn test_select_page_covers_visible_page_not_full_filtered_set() {
        let mut c = controller(seeded(5), 3).await;
        c.toggle_mode();
        c.toggle_select(1);

        // 选择集与整页不同：整体替换为当前页
        c.toggle_select_page();
        assert_eq!(c.selection().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_selection_cleared_on_page_filter_search_and_mode_change() {
        let mut c = controller(seeded(7), 3).await;
        c.toggle_mode();

        c.toggle_select(1);
        c.set_page(2);
        assert!(c.selection().is_empty());

        c.toggle_select(4);
        c.set_filter(StatusFilter::Unread);
        assert!(c.selection().is_empty());

        c.toggle_select(4);
        c.set_search("Title");
        assert!(c.selection().is_empty());

        c.toggle_select(4);
        c.toggle_mode();
        assert!(c.selection().is_empty());
    }

    #[tokio::test]
    async fn test_mark_selected_read_sends_exact_ids_and_exits_selecting() {
        let backend = MockBackend::seeded(seeded(3));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        c.toggle_mode();
        c.toggle_select(1);
        c.toggle_select(3);
        c.mark_selected_read().await.unwrap();

        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("toggle_read".to_string(), vec![1, 3], false)]);

        assert!(c.selection().is_empty());
        assert_eq!(c.mode(), InboxMode::Browsing);
        // 刷新后读到权威状态
        assert!(!c.filtered()[0].is_unread());
        assert!(c.filtered()[1].is_unread());
        assert!(!c.filtered()[2].is_unread());
    }

    #[tokio::test]
    async fn test_mark_all_read_uses_all_flag() {
        let backend = MockBackend::seeded(seeded(3));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        c.mark_all_read().await.unwrap();

        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("toggle_read".to_string(), Vec::new(), true)]);
        assert!(c.filtered().iter().all(|n| !n.is_unread()));
    }

    #[tokio::test]
    async fn test_all_flag_takes_precedence_over_ids() {
        let backend = MockBackend::seeded(seeded(3));

        // all=true 时 ids 内容无关紧要，整个收件箱都被标记
        backend.toggle_read(&[2], true).await.unwrap();

        let items = backend.items.lock().unwrap().clone();
        assert!(items.iter().all(|n| n.status == NotificationStatus::Read));
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_per_id() {
        let backend = MockBackend::seeded(seeded(2));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        for _ in 0..2 {
            c.toggle_mode();
            c.toggle_select(1);
            c.mark_selected_read().await.unwrap();
        }

        let statuses: Vec<NotificationStatus> = c.filtered().iter().map(|n| n.status).collect();
        assert_eq!(
            statuses,
            vec![NotificationStatus::Read, NotificationStatus::Unread]
        );
    }

    #[tokio::test]
    async fn test_delete_selected_stays_in_selecting_mode() {
        let backend = MockBackend::seeded(seeded(4));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        c.toggle_mode();
        c.toggle_select(2);
        c.delete_selected().await.unwrap();

        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("delete".to_string(), vec![2], false)]);
        assert!(c.selection().is_empty());
        // 删除不退出多选模式（与标记已读不同）
        assert_eq!(c.mode(), InboxMode::Selecting);
    }

    #[tokio::test]
    async fn test_delete_all_requires_confirmation() {
        let backend = MockBackend::seeded(seeded(3));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        // 确认被拒绝：不发请求。单条/多选删除不确认是有意的不对称
        let issued = c.delete_all(|| false).await.unwrap();
        assert!(!issued);
        assert!(backend.calls.lock().unwrap().is_empty());
        assert_eq!(c.filtered().len(), 3);

        let issued = c.delete_all(|| true).await.unwrap();
        assert!(issued);
        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("delete".to_string(), Vec::new(), true)]);
        assert!(c.filtered().is_empty());
    }

    #[tokio::test]
    async fn test_unread_delete_scenario_keeps_page() {
        // 收件箱 [1:UNREAD, 2:UNREAD, 3:READ]，filter=UNREAD，pageSize=3
        let backend = MockBackend::seeded(vec![
            notification(1, "a", "b", NotificationStatus::Unread),
            notification(2, "a", "b", NotificationStatus::Unread),
            notification(3, "a", "b", NotificationStatus::Read),
        ]);
        let mut c = InboxController::with_page_size(backend, 1, 3);
        c.refresh().await.unwrap();
        c.set_filter(StatusFilter::Unread);

        let ids: Vec<i64> = c.filtered().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(c.total_pages(), 1);

        c.delete_one(1).await.unwrap();

        let ids: Vec<i64> = c.filtered().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(c.total_pages(), 1);
        assert_eq!(c.page(), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_state_untouched() {
        let backend = MockBackend::seeded(seeded(3));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        c.toggle_mode();
        c.toggle_select(1);
        *backend.fail.lock().unwrap() = true;

        assert!(c.mark_selected_read().await.is_err());

        // 选择集、模式、本地快照都保持原样
        assert_eq!(c.selection().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(c.mode(), InboxMode::Selecting);
        assert!(c.filtered().iter().all(|n| n.is_unread()));
    }

    #[tokio::test]
    async fn test_empty_selection_mutations_are_noops() {
        let backend = MockBackend::seeded(seeded(3));
        let mut c = InboxController::with_page_size(backend.clone(), 1, 3);
        c.refresh().await.unwrap();

        c.mark_selected_read().await.unwrap();
        c.delete_selected().await.unwrap();

        assert!(backend.calls.lock().unwrap().is_empty());
    }
}
