//! 遥测输出端
//!
//! 管线只依赖 [`TelemetrySink`]，不关心下游是 OSC 总线、内存队列还是测试桩。

use crate::error::TelemetryFault;
use crate::liveness::LivenessReport;
use armlink_protocol::TelemetrySample;

/// 一次待发布的遥测更新
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryUpdate {
    /// 样本（`joints` 已经过零值抑制）
    pub sample: TelemetrySample,
    /// 被 last-known-good 替换的关节（Bit 0-5）
    pub substituted_mask: u8,
    /// 会话内单调递增的样本序号
    pub sequence: u64,
}

/// 遥测输出端
///
/// 由遥测线程独占调用，因此只要求 `Send`。
pub trait TelemetrySink: Send {
    /// 发布一次样本（已经过限速）
    fn publish(&mut self, update: &TelemetryUpdate);

    /// 报告一次遥测故障
    fn report_fault(&mut self, fault: &TelemetryFault);

    /// 报告活性统计（默认忽略）
    fn report_liveness(&mut self, _report: &LivenessReport) {}
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for &mut S {
    fn publish(&mut self, update: &TelemetryUpdate) {
        (**self).publish(update)
    }

    fn report_fault(&mut self, fault: &TelemetryFault) {
        (**self).report_fault(fault)
    }

    fn report_liveness(&mut self, report: &LivenessReport) {
        (**self).report_liveness(report)
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn publish(&mut self, update: &TelemetryUpdate) {
        (**self).publish(update)
    }

    fn report_fault(&mut self, fault: &TelemetryFault) {
        (**self).report_fault(fault)
    }

    fn report_liveness(&mut self, report: &LivenessReport) {
        (**self).report_liveness(report)
    }
}
