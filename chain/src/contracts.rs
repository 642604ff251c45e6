use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external
            payable
            returns (Result[] memory returnData);
    }
}

sol! {
    interface IERC20 {
        event Transfer(
            address indexed from,
            address indexed to,
            uint256 value
        );

        function balanceOf(address account) external view returns (uint256);
    }

    interface IAssetOnchain {
        function getUserStakedOrder(address user)
            external
            view
            returns (uint256[] memory);

        function getMarketplaceReward(address user, uint256[] memory orders)
            external
            view
            returns (uint256);
    }

    interface IBitcoinStake {
        function btcTxMap(bytes32 txHash)
            external
            view
            returns (uint256 amount);
    }

    interface IMarketplace {
        struct BtcClaim {
            address receiver;
            bytes32 txHash;
            address to;
        }

        function claimBTCRewardProxyOnBehalf(BtcClaim[] memory claims)
            external
            returns (uint256[] memory);
    }

    interface ICandidateHub {
        event turnedRound(uint256 round);
    }
}
