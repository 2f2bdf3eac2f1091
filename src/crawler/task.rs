use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::Error;

// 每个位置一个句柄而不是 JoinSet，按提交顺序等待，结果顺序与请求顺序一致
pub struct TaskManager<R: Send + 'static> {
    tasks: Vec<JoinHandle<R>>,
}

impl<R: Send + 'static> Default for TaskManager<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send + 'static> TaskManager<R> {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = R> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 任务 panic 或被取消时对应位置为 `Error::Task`，不影响其他任务
    pub async fn wait(self) -> Vec<Result<R, Error>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            results.push(task.await.map_err(|e| Error::Task(e.to_string())));
        }
        results
    }
}
